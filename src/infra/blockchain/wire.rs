//! Solana legacy transaction wire format, built by hand.
//!
//! ```text
//! Transaction:
//!   num_signatures          compact-u16
//!   signatures              64 bytes * num_signatures
//!   message:
//!     num_required_sigs     u8
//!     num_readonly_signed   u8
//!     num_readonly_unsigned u8
//!     num_accounts          compact-u16
//!     account_keys          32 bytes * num_accounts
//!     recent_blockhash      32 bytes
//!     num_instructions      compact-u16
//!     instructions[]        (program_id_index u8, account indices, data)
//! ```
//!
//! Account keys are laid out in canonical order: writable signers (fee payer
//! first), read-only signers, writable non-signers, read-only non-signers.
//! Partial signing fills the signature slots of the keys we hold and leaves
//! the remaining slots zeroed for the wallet to complete.

use ed25519_dalek::{Signer, SigningKey};

use crate::domain::{AppError, ChainError};

/// A single account reference in an instruction.
#[derive(Debug, Clone)]
pub struct AccountMeta {
    pub pubkey: [u8; 32],
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    #[must_use]
    pub fn signer(pubkey: [u8; 32], is_writable: bool) -> Self {
        Self {
            pubkey,
            is_signer: true,
            is_writable,
        }
    }

    #[must_use]
    pub fn readonly(pubkey: [u8; 32]) -> Self {
        Self {
            pubkey,
            is_signer: false,
            is_writable: false,
        }
    }

    #[must_use]
    pub fn writable(pubkey: [u8; 32]) -> Self {
        Self {
            pubkey,
            is_signer: false,
            is_writable: true,
        }
    }
}

/// An instruction before compilation into a transaction.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub program_id: [u8; 32],
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// A compiled instruction: account references replaced with u8 indices into
/// the transaction's account key table.
#[derive(Debug, Clone)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indices: Vec<u8>,
    pub data: Vec<u8>,
}

/// A compiled legacy transaction, unsigned.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub account_keys: Vec<[u8; 32]>,
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
    pub recent_blockhash: [u8; 32],
    pub compiled_instructions: Vec<CompiledInstruction>,
}

/// Encode a `u16` in Solana's compact-u16 format (1-3 bytes).
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = value as u32;
    let mut out = Vec::with_capacity(3);

    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }

    out
}

/// Decode a compact-u16, returning `(value, bytes_consumed)`.
pub fn decode_compact_u16(data: &[u8]) -> Result<(u16, usize), AppError> {
    let mut value: u32 = 0;
    let mut shift = 0u32;
    let mut consumed = 0usize;

    loop {
        let byte = *data.get(consumed).ok_or_else(|| {
            AppError::Chain(ChainError::InvalidTransaction(
                "unexpected end of data while decoding compact-u16".to_string(),
            ))
        })?;
        consumed += 1;

        value |= ((byte & 0x7f) as u32) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            break;
        }
        if consumed >= 3 {
            break;
        }
    }

    if value > u16::MAX as u32 {
        return Err(AppError::Chain(ChainError::InvalidTransaction(
            "compact-u16 value overflow".to_string(),
        )));
    }

    Ok((value as u16, consumed))
}

/// Compile instructions into a transaction with the given fee payer.
///
/// The fee payer is always the first signer, at index 0 of the account keys.
/// Additional signers (e.g. a freshly generated mint keypair) are picked up
/// from the instruction account metas.
pub fn compile_transaction(
    instructions: &[Instruction],
    fee_payer: &[u8; 32],
    recent_blockhash: &[u8; 32],
) -> Result<Transaction, AppError> {
    struct Entry {
        pubkey: [u8; 32],
        is_signer: bool,
        is_writable: bool,
    }

    let mut entries: Vec<Entry> = Vec::new();
    let mut upsert = |pubkey: [u8; 32], signer: bool, writable: bool| {
        if let Some(entry) = entries.iter_mut().find(|e| e.pubkey == pubkey) {
            entry.is_signer |= signer;
            entry.is_writable |= writable;
        } else {
            entries.push(Entry {
                pubkey,
                is_signer: signer,
                is_writable: writable,
            });
        }
    };

    upsert(*fee_payer, true, true);

    for ix in instructions {
        for meta in &ix.accounts {
            upsert(meta.pubkey, meta.is_signer, meta.is_writable);
        }
        // Program IDs are non-signer, read-only accounts.
        upsert(ix.program_id, false, false);
    }

    // Canonical order; stable sort keeps the fee payer first within its class.
    fn rank(signer: bool, writable: bool) -> u8 {
        match (signer, writable) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        }
    }
    entries.sort_by_key(|e| rank(e.is_signer, e.is_writable));

    if entries[0].pubkey != *fee_payer {
        let pos = entries
            .iter()
            .position(|e| e.pubkey == *fee_payer)
            .expect("fee payer was inserted above");
        entries.swap(0, pos);
    }

    let num_required_signatures = entries.iter().filter(|e| e.is_signer).count() as u8;
    let num_readonly_signed = entries
        .iter()
        .filter(|e| e.is_signer && !e.is_writable)
        .count() as u8;
    let num_readonly_unsigned = entries
        .iter()
        .filter(|e| !e.is_signer && !e.is_writable)
        .count() as u8;

    let account_keys: Vec<[u8; 32]> = entries.iter().map(|e| e.pubkey).collect();

    let mut compiled = Vec::with_capacity(instructions.len());
    for ix in instructions {
        let program_id_index = account_keys
            .iter()
            .position(|k| *k == ix.program_id)
            .ok_or_else(|| {
                AppError::Chain(ChainError::InvalidTransaction(
                    "program_id not in account keys".to_string(),
                ))
            })? as u8;

        let mut account_indices = Vec::with_capacity(ix.accounts.len());
        for meta in &ix.accounts {
            let idx = account_keys
                .iter()
                .position(|k| *k == meta.pubkey)
                .ok_or_else(|| {
                    AppError::Chain(ChainError::InvalidTransaction(
                        "account not in account keys".to_string(),
                    ))
                })? as u8;
            account_indices.push(idx);
        }

        compiled.push(CompiledInstruction {
            program_id_index,
            account_indices,
            data: ix.data.clone(),
        });
    }

    Ok(Transaction {
        account_keys,
        num_required_signatures,
        num_readonly_signed,
        num_readonly_unsigned,
        recent_blockhash: *recent_blockhash,
        compiled_instructions: compiled,
    })
}

/// Serialize the transaction message (the bytes that get signed).
pub fn serialize_message(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);

    buf.push(tx.num_required_signatures);
    buf.push(tx.num_readonly_signed);
    buf.push(tx.num_readonly_unsigned);

    buf.extend_from_slice(&encode_compact_u16(tx.account_keys.len() as u16));
    for key in &tx.account_keys {
        buf.extend_from_slice(key);
    }

    buf.extend_from_slice(&tx.recent_blockhash);

    buf.extend_from_slice(&encode_compact_u16(tx.compiled_instructions.len() as u16));
    for ix in &tx.compiled_instructions {
        buf.push(ix.program_id_index);
        buf.extend_from_slice(&encode_compact_u16(ix.account_indices.len() as u16));
        buf.extend_from_slice(&ix.account_indices);
        buf.extend_from_slice(&encode_compact_u16(ix.data.len() as u16));
        buf.extend_from_slice(&ix.data);
    }

    buf
}

/// Serialize a partially signed transaction to its wire format.
///
/// All signature slots are allocated up front. Slots whose account key
/// matches one of `signers` are filled; the rest (typically the sender's
/// wallet) stay zeroed for client-side completion.
pub fn serialize_partially_signed(
    tx: &Transaction,
    signers: &[&SigningKey],
) -> Result<Vec<u8>, AppError> {
    let message = serialize_message(tx);
    let num_signers = tx.num_required_signatures as usize;

    let mut wire = Vec::with_capacity(3 + 64 * num_signers + message.len());
    wire.extend_from_slice(&encode_compact_u16(num_signers as u16));

    for slot in 0..num_signers {
        let key = &tx.account_keys[slot];
        match signers
            .iter()
            .find(|s| s.verifying_key().to_bytes() == *key)
        {
            Some(signer) => wire.extend_from_slice(&signer.sign(&message).to_bytes()),
            None => wire.extend_from_slice(&[0u8; 64]),
        }
    }

    wire.extend_from_slice(&message);
    Ok(wire)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn noop_instruction(program: [u8; 32], accounts: Vec<AccountMeta>) -> Instruction {
        Instruction {
            program_id: program,
            accounts,
            data: vec![1, 2, 3],
        }
    }

    #[test]
    fn compact_u16_single_byte() {
        assert_eq!(encode_compact_u16(0), vec![0x00]);
        assert_eq!(encode_compact_u16(0x7f), vec![0x7f]);
    }

    #[test]
    fn compact_u16_boundaries() {
        assert_eq!(encode_compact_u16(128), vec![0x80, 0x01]);
        assert_eq!(encode_compact_u16(16383), vec![0xff, 0x7f]);
        assert_eq!(encode_compact_u16(16384), vec![0x80, 0x80, 0x01]);
        assert_eq!(encode_compact_u16(u16::MAX), vec![0xff, 0xff, 0x03]);
    }

    #[test]
    fn compact_u16_roundtrip() {
        for value in [0u16, 1, 127, 128, 255, 16383, 16384, 65535] {
            let encoded = encode_compact_u16(value);
            let (decoded, len) = decode_compact_u16(&encoded).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(len, encoded.len());
        }
    }

    #[test]
    fn decode_compact_u16_empty_fails() {
        assert!(decode_compact_u16(&[]).is_err());
    }

    #[test]
    fn compile_puts_fee_payer_first() {
        let fee_payer = [1u8; 32];
        let other = [2u8; 32];
        let program = [9u8; 32];
        let blockhash = [0xAA; 32];

        let ix = noop_instruction(program, vec![AccountMeta::writable(other)]);
        let tx = compile_transaction(&[ix], &fee_payer, &blockhash).unwrap();

        assert_eq!(tx.account_keys[0], fee_payer);
        assert_eq!(tx.num_required_signatures, 1);
        assert_eq!(tx.num_readonly_unsigned, 1); // the program id
        assert_eq!(tx.recent_blockhash, blockhash);
    }

    #[test]
    fn compile_counts_extra_signers() {
        let fee_payer = [1u8; 32];
        let mint = [2u8; 32];
        let program = [9u8; 32];

        let ix = noop_instruction(
            program,
            vec![
                AccountMeta::signer(fee_payer, true),
                AccountMeta::signer(mint, true),
            ],
        );
        let tx = compile_transaction(&[ix], &fee_payer, &[0u8; 32]).unwrap();

        assert_eq!(tx.num_required_signatures, 2);
        // Both signers precede the program id in the key table.
        assert_eq!(tx.account_keys[0], fee_payer);
        assert_eq!(tx.account_keys[1], mint);
    }

    #[test]
    fn compile_merges_duplicate_accounts() {
        let fee_payer = [1u8; 32];
        let program = [9u8; 32];

        let ix_a = noop_instruction(program, vec![AccountMeta::writable(fee_payer)]);
        let ix_b = noop_instruction(program, vec![AccountMeta::readonly(fee_payer)]);
        let tx = compile_transaction(&[ix_a, ix_b], &fee_payer, &[0u8; 32]).unwrap();

        // fee payer + program only
        assert_eq!(tx.account_keys.len(), 2);
    }

    #[test]
    fn serialized_message_layout() {
        let fee_payer = [1u8; 32];
        let program = [9u8; 32];
        let blockhash = [0xCC; 32];

        let ix = noop_instruction(program, vec![AccountMeta::signer(fee_payer, true)]);
        let tx = compile_transaction(&[ix], &fee_payer, &blockhash).unwrap();
        let msg = serialize_message(&tx);

        assert_eq!(msg[0], tx.num_required_signatures);
        assert_eq!(msg[1], tx.num_readonly_signed);
        assert_eq!(msg[2], tx.num_readonly_unsigned);

        // Blockhash sits after header + compact-u16 + key table.
        let n = tx.account_keys.len();
        let offset = 3 + encode_compact_u16(n as u16).len() + 32 * n;
        assert_eq!(&msg[offset..offset + 32], &blockhash);
    }

    #[test]
    fn partial_signing_fills_only_held_slots() {
        use ed25519_dalek::{Signature, VerifyingKey};

        let sender_key = SigningKey::generate(&mut OsRng);
        let mint_key = SigningKey::generate(&mut OsRng);
        let sender = sender_key.verifying_key().to_bytes();
        let mint = mint_key.verifying_key().to_bytes();
        let program = [9u8; 32];

        let ix = noop_instruction(
            program,
            vec![
                AccountMeta::signer(sender, true),
                AccountMeta::signer(mint, true),
            ],
        );
        let tx = compile_transaction(&[ix], &sender, &[0x11; 32]).unwrap();
        let wire = serialize_partially_signed(&tx, &[&mint_key]).unwrap();

        // Two signature slots.
        assert_eq!(wire[0], 2);

        // Slot 0 (sender) is zeroed.
        assert!(wire[1..65].iter().all(|b| *b == 0));

        // Slot 1 (mint) carries a valid signature over the message.
        let sig_bytes: [u8; 64] = wire[65..129].try_into().unwrap();
        let signature = Signature::from_bytes(&sig_bytes);
        let message = &wire[129..];
        let vk = VerifyingKey::from_bytes(&mint).unwrap();
        assert!(vk.verify_strict(message, &signature).is_ok());
    }

    #[test]
    fn partial_signing_is_deterministic() {
        let sender_key = SigningKey::generate(&mut OsRng);
        let mint_key = SigningKey::generate(&mut OsRng);
        let sender = sender_key.verifying_key().to_bytes();
        let mint = mint_key.verifying_key().to_bytes();

        let ix = noop_instruction(
            [9u8; 32],
            vec![
                AccountMeta::signer(sender, true),
                AccountMeta::signer(mint, true),
            ],
        );
        let tx = compile_transaction(&[ix], &sender, &[0x22; 32]).unwrap();

        let a = serialize_partially_signed(&tx, &[&mint_key]).unwrap();
        let b = serialize_partially_signed(&tx, &[&mint_key]).unwrap();
        assert_eq!(a, b);
    }
}
