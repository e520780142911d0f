//! Encrypted container codec.
//!
//! On-disk layout: `[16-byte random IV][AES-256-CBC ciphertext, PKCS#7 padded]`.
//! Both directions run as streaming transforms over async readers and
//! writers with a fixed chunk buffer, so memory use is independent of
//! file size. The codec holds no state between calls and is safe for
//! concurrent use with independent streams.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::key::VaultKey;

/// Size of the container initialization vector in bytes
pub const IV_SIZE: usize = 16;
/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;
/// Chunk size for streaming operations
const CHUNK_SIZE: usize = 4096;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Errors that can occur while encoding or decoding a container
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The container is truncated, not block-aligned, or carries
    /// invalid padding.
    #[error("malformed encrypted container")]
    MalformedContainer,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encrypt a plaintext stream into container format.
///
/// Writes the random IV followed by the CBC ciphertext. Returns the
/// number of plaintext bytes consumed.
pub async fn encrypt_stream<R, W>(
    key: &VaultKey,
    mut reader: R,
    mut writer: W,
) -> Result<u64, CodecError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut iv = [0u8; IV_SIZE];
    getrandom::getrandom(&mut iv).map_err(|e| CodecError::Io(std::io::Error::other(e)))?;

    let mut enc = Aes256CbcEnc::new(
        GenericArray::from_slice(key.bytes()),
        GenericArray::from_slice(&iv),
    );

    writer.write_all(&iv).await?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    // carries the partial trailing block between chunks
    let mut pending: Vec<u8> = Vec::with_capacity(CHUNK_SIZE + BLOCK_SIZE);
    let mut plaintext_len: u64 = 0;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        plaintext_len += n as u64;
        pending.extend_from_slice(&buf[..n]);

        let full = pending.len() - pending.len() % BLOCK_SIZE;
        if full > 0 {
            for block in pending[..full].chunks_exact_mut(BLOCK_SIZE) {
                enc.encrypt_block_mut(GenericArray::from_mut_slice(block));
            }
            writer.write_all(&pending[..full]).await?;
            pending.drain(..full);
        }
    }

    // PKCS#7 always appends a padded final block, even for empty input
    let pad = (BLOCK_SIZE - pending.len()) as u8;
    pending.resize(BLOCK_SIZE, pad);
    enc.encrypt_block_mut(GenericArray::from_mut_slice(&mut pending[..]));
    writer.write_all(&pending).await?;
    writer.flush().await?;

    Ok(plaintext_len)
}

/// Decrypt a container stream back into plaintext.
///
/// Reads exactly the first 16 bytes as the IV, then decrypts the
/// remainder as a streaming pipe, stripping PKCS#7 padding from the
/// final block. Returns the number of plaintext bytes produced.
pub async fn decrypt_stream<R, W>(
    key: &VaultKey,
    mut reader: R,
    mut writer: W,
) -> Result<u64, CodecError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut iv = [0u8; IV_SIZE];
    let mut filled = 0;
    while filled < IV_SIZE {
        let n = reader.read(&mut iv[filled..]).await?;
        if n == 0 {
            return Err(CodecError::MalformedContainer);
        }
        filled += n;
    }

    let mut dec = Aes256CbcDec::new(
        GenericArray::from_slice(key.bytes()),
        GenericArray::from_slice(&iv),
    );

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut pending: Vec<u8> = Vec::with_capacity(CHUNK_SIZE + BLOCK_SIZE);
    let mut plaintext_len: u64 = 0;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        pending.extend_from_slice(&buf[..n]);

        // decrypt all complete blocks except the last one seen so far;
        // the final block must be held back until EOF to strip padding
        if pending.len() > BLOCK_SIZE {
            let full = (pending.len() - 1) / BLOCK_SIZE * BLOCK_SIZE;
            for block in pending[..full].chunks_exact_mut(BLOCK_SIZE) {
                dec.decrypt_block_mut(GenericArray::from_mut_slice(block));
            }
            writer.write_all(&pending[..full]).await?;
            plaintext_len += full as u64;
            pending.drain(..full);
        }
    }

    // a well-formed container always ends on exactly one held-back block
    if pending.len() != BLOCK_SIZE {
        return Err(CodecError::MalformedContainer);
    }
    dec.decrypt_block_mut(GenericArray::from_mut_slice(&mut pending[..]));

    let pad = pending[BLOCK_SIZE - 1] as usize;
    if pad == 0 || pad > BLOCK_SIZE {
        return Err(CodecError::MalformedContainer);
    }
    if !pending[BLOCK_SIZE - pad..].iter().all(|&b| b as usize == pad) {
        return Err(CodecError::MalformedContainer);
    }

    writer.write_all(&pending[..BLOCK_SIZE - pad]).await?;
    plaintext_len += (BLOCK_SIZE - pad) as u64;
    writer.flush().await?;

    Ok(plaintext_len)
}

#[cfg(test)]
mod test {
    use super::*;

    async fn round_trip(data: &[u8]) -> Vec<u8> {
        let key = VaultKey::generate();

        let mut container = Vec::new();
        let written = encrypt_stream(&key, data, &mut container).await.unwrap();
        assert_eq!(written, data.len() as u64);
        // IV plus at least one padded block
        assert!(container.len() >= IV_SIZE + BLOCK_SIZE);
        assert_eq!((container.len() - IV_SIZE) % BLOCK_SIZE, 0);

        let mut plaintext = Vec::new();
        let read = decrypt_stream(&key, container.as_slice(), &mut plaintext)
            .await
            .unwrap();
        assert_eq!(read, data.len() as u64);
        plaintext
    }

    #[tokio::test]
    async fn test_round_trip_various_sizes() {
        for size in [0usize, 1, 15, 16, 17, 255, 4096, 4096 + 5, 100_000] {
            let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            let plaintext = round_trip(&data).await;
            assert_eq!(plaintext, data, "round trip failed for size {}", size);
        }
    }

    #[tokio::test]
    async fn test_empty_input() {
        assert_eq!(round_trip(b"").await, b"");
    }

    #[tokio::test]
    async fn test_ciphertext_differs_from_plaintext() {
        let key = VaultKey::generate();
        let data = b"ten bytes!";

        let mut container = Vec::new();
        encrypt_stream(&key, data.as_slice(), &mut container)
            .await
            .unwrap();

        assert!(!container.windows(data.len()).any(|w| w == data));
    }

    #[tokio::test]
    async fn test_fresh_iv_per_encryption() {
        let key = VaultKey::generate();
        let data = b"same plaintext";

        let mut a = Vec::new();
        let mut b = Vec::new();
        encrypt_stream(&key, data.as_slice(), &mut a).await.unwrap();
        encrypt_stream(&key, data.as_slice(), &mut b).await.unwrap();

        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_truncated_container() {
        let key = VaultKey::generate();

        for container in [&b""[..], &[0u8; 7][..], &[0u8; 15][..]] {
            let mut out = Vec::new();
            let err = decrypt_stream(&key, container, &mut out).await.unwrap_err();
            assert!(matches!(err, CodecError::MalformedContainer));
        }
    }

    #[tokio::test]
    async fn test_iv_only_container() {
        // a full IV but zero ciphertext blocks is malformed: PKCS#7
        // always produces at least one block
        let key = VaultKey::generate();
        let container = [0u8; IV_SIZE];

        let mut out = Vec::new();
        let err = decrypt_stream(&key, &container[..], &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, CodecError::MalformedContainer));
    }

    #[tokio::test]
    async fn test_unaligned_ciphertext() {
        let key = VaultKey::generate();
        let data = b"some plaintext that spans a couple of blocks at least";

        let mut container = Vec::new();
        encrypt_stream(&key, data.as_slice(), &mut container)
            .await
            .unwrap();
        container.pop();

        let mut out = Vec::new();
        let err = decrypt_stream(&key, container.as_slice(), &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, CodecError::MalformedContainer));
    }
}
