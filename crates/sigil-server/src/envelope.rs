//! Sealing primitives behind `sigil.1.encrypt` and `unboxBytes32`.
//!
//! A box is the NaCl `crypto_box` construction (x25519, XSalsa20-Poly1305)
//! between two keys. An [`Envelope`] encrypts the payload once with
//! XChaCha20-Poly1305 under a random payload key, then boxes that key from a
//! per-envelope ephemeral key to every recipient.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use crypto_box::SalsaBox;
use sigil_protocol::encrypt::{ENVELOPE_VERSION, Envelope, RecipientBox};
use sigil_protocol::{BoxNonce, BoxPublicKey, Bytes32, EncryptedBytes32};
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u32),

    #[error("envelope is not addressed to this key")]
    NotARecipient,

    /// Authentication failed; the data was altered or the key is wrong
    #[error("message failed authentication")]
    Corrupt,

    /// Peer key is a low order point
    #[error("peer public key is not usable")]
    WeakKey,

    #[error("encryption failed")]
    Seal,
}

/// Seal `plaintext` to every key in `recipients`
pub fn seal(recipients: &[BoxPublicKey], plaintext: &[u8]) -> Result<Envelope, EnvelopeError> {
    let ephemeral = StaticSecret::from(rand::random::<[u8; 32]>());
    let ephemeral_key = public_key_of(&ephemeral);

    let payload_key = Bytes32::from(rand::random::<[u8; 32]>());
    let nonce = BoxNonce::from(rand::random::<[u8; 24]>());
    let ciphertext = XChaCha20Poly1305::new(Key::from_slice(payload_key.as_bytes()))
        .encrypt(
            XNonce::from_slice(nonce.as_bytes()),
            Payload {
                msg: plaintext,
                aad: ephemeral_key.as_bytes(),
            },
        )
        .map_err(|_| EnvelopeError::Seal)?;

    let mut boxes = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        let nonce = BoxNonce::from(rand::random::<[u8; 24]>());
        boxes.push(RecipientBox {
            public_key: *recipient,
            nonce,
            wrapped_key: box_seal(&ephemeral, recipient, &nonce, &payload_key)?,
        });
    }

    Ok(Envelope {
        version: ENVELOPE_VERSION,
        ephemeral_key,
        recipients: boxes,
        nonce,
        ciphertext,
    })
}

/// Open an envelope with one recipient's box secret
pub fn open(envelope: &Envelope, secret: &StaticSecret) -> Result<Vec<u8>, EnvelopeError> {
    if envelope.version != ENVELOPE_VERSION {
        return Err(EnvelopeError::UnsupportedVersion(envelope.version));
    }
    let entry = envelope
        .recipient(&public_key_of(secret))
        .ok_or(EnvelopeError::NotARecipient)?;

    let payload_key = box_open(
        secret,
        &envelope.ephemeral_key,
        &entry.nonce,
        &entry.wrapped_key,
    )?;
    XChaCha20Poly1305::new(Key::from_slice(payload_key.as_bytes()))
        .decrypt(
            XNonce::from_slice(envelope.nonce.as_bytes()),
            Payload {
                msg: &envelope.ciphertext,
                aad: envelope.ephemeral_key.as_bytes(),
            },
        )
        .map_err(|_| EnvelopeError::Corrupt)
}

/// Box 32 bytes from `secret` to `peer`
pub fn box_seal(
    secret: &StaticSecret,
    peer: &BoxPublicKey,
    nonce: &BoxNonce,
    plaintext: &Bytes32,
) -> Result<EncryptedBytes32, EnvelopeError> {
    let sealed = salsa_box(secret, peer)?
        .encrypt(box_nonce(nonce), &plaintext.0[..])
        .map_err(|_| EnvelopeError::Seal)?;
    <[u8; 48]>::try_from(sealed.as_slice())
        .map(EncryptedBytes32::from)
        .map_err(|_| EnvelopeError::Seal)
}

/// Open a box that `peer` sealed for `secret`
pub fn box_open(
    secret: &StaticSecret,
    peer: &BoxPublicKey,
    nonce: &BoxNonce,
    sealed: &EncryptedBytes32,
) -> Result<Bytes32, EnvelopeError> {
    let opened = salsa_box(secret, peer)?
        .decrypt(box_nonce(nonce), &sealed.0[..])
        .map_err(|_| EnvelopeError::Corrupt)?;
    <[u8; 32]>::try_from(opened.as_slice())
        .map(Bytes32::from)
        .map_err(|_| EnvelopeError::Corrupt)
}

pub fn public_key_of(secret: &StaticSecret) -> BoxPublicKey {
    BoxPublicKey::from(PublicKey::from(secret).to_bytes())
}

fn salsa_box(secret: &StaticSecret, peer: &BoxPublicKey) -> Result<SalsaBox, EnvelopeError> {
    if !secret
        .diffie_hellman(&PublicKey::from(peer.0))
        .was_contributory()
    {
        return Err(EnvelopeError::WeakKey);
    }
    Ok(SalsaBox::new(
        &crypto_box::PublicKey::from(peer.0),
        &crypto_box::SecretKey::from(secret.to_bytes()),
    ))
}

fn box_nonce(nonce: &BoxNonce) -> &crypto_box::aead::Nonce<SalsaBox> {
    crypto_box::aead::Nonce::<SalsaBox>::from_slice(nonce.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair(seed: u8) -> (StaticSecret, BoxPublicKey) {
        let secret = StaticSecret::from([seed; 32]);
        let public = public_key_of(&secret);
        (secret, public)
    }

    #[test]
    fn test_every_recipient_opens_the_envelope() {
        let keys: Vec<_> = (1..=3).map(keypair).collect();
        let publics: Vec<_> = keys.iter().map(|(_, p)| *p).collect();

        let envelope = seal(&publics, b"attack at dawn").unwrap();
        assert_eq!(envelope.recipients.len(), 3);
        assert_ne!(&envelope.ciphertext[..14], b"attack at dawn");

        for (secret, _) in &keys {
            assert_eq!(open(&envelope, secret).unwrap(), b"attack at dawn");
        }
        let (stranger, _) = keypair(9);
        assert_eq!(open(&envelope, &stranger), Err(EnvelopeError::NotARecipient));
    }

    #[test]
    fn test_tampering_is_detected() {
        let (secret, public) = keypair(1);
        let envelope = seal(&[public], b"ledger").unwrap();
        assert_eq!(open(&envelope, &secret).unwrap(), b"ledger");

        let mut flipped = envelope.clone();
        flipped.ciphertext[0] ^= 1;
        assert_eq!(open(&flipped, &secret), Err(EnvelopeError::Corrupt));

        let mut rekeyed = envelope.clone();
        rekeyed.ephemeral_key = keypair(5).1;
        assert_eq!(open(&rekeyed, &secret), Err(EnvelopeError::Corrupt));

        // A box copied onto another key's entry does not open
        let (other_secret, other_public) = keypair(2);
        let mut swapped = envelope.clone();
        swapped.recipients[0].public_key = other_public;
        assert_eq!(open(&swapped, &other_secret), Err(EnvelopeError::Corrupt));

        let mut future = envelope;
        future.version = 2;
        assert_eq!(open(&future, &secret), Err(EnvelopeError::UnsupportedVersion(2)));
    }

    #[test]
    fn test_empty_payload() {
        let (secret, public) = keypair(4);
        let envelope = seal(&[public], b"").unwrap();
        assert_eq!(envelope.ciphertext.len(), 16);
        assert!(open(&envelope, &secret).unwrap().is_empty());
    }

    #[test]
    fn test_box_between_static_keys() {
        let (alice, alice_public) = keypair(1);
        let (bob, bob_public) = keypair(2);
        let nonce = BoxNonce::from([7; 24]);
        let secret = Bytes32::from([0xab; 32]);

        let sealed = box_seal(&alice, &bob_public, &nonce, &secret).unwrap();
        assert_eq!(box_open(&bob, &alice_public, &nonce, &sealed).unwrap(), secret);

        let mut bad = sealed;
        bad.0[40] ^= 0xff;
        assert_eq!(
            box_open(&bob, &alice_public, &nonce, &bad),
            Err(EnvelopeError::Corrupt)
        );
        let wrong_nonce = BoxNonce::from([8; 24]);
        assert!(box_open(&bob, &alice_public, &wrong_nonce, &sealed).is_err());
    }

    #[test]
    fn test_low_order_peer_is_refused() {
        let (alice, _) = keypair(1);
        let zero = BoxPublicKey::from([0; 32]);
        let err = box_seal(&alice, &zero, &BoxNonce::default(), &Bytes32::default()).unwrap_err();
        assert_eq!(err, EnvelopeError::WeakKey);
    }
}
