//! SPL Token and Metaplex instruction encodings, without `solana-sdk`.
//!
//! Covers exactly what one message mint needs: System `CreateAccount`,
//! `InitializeMint2`, the associated token account create, `MintTo`, and
//! Metaplex `CreateMetadataAccountV3`. Program derived addresses are found
//! by the standard bump search over SHA-256.

use sha2::{Digest, Sha256};

use crate::domain::{AppError, ChainError};

use super::wire::{AccountMeta, Instruction};

/// Solana System Program: 32 zero bytes (`11111111111111111111111111111111`).
pub const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];

/// SPL Token Program: `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`.
pub const TOKEN_PROGRAM_ID: [u8; 32] = [
    0x06, 0xdd, 0xf6, 0xe1, 0xd7, 0x65, 0xa1, 0x93, 0xd9, 0xcb, 0xe1, 0x46, 0xce, 0xeb, 0x79,
    0xac, 0x1c, 0xb4, 0x85, 0xed, 0x5f, 0x5b, 0x37, 0x91, 0x3a, 0x8c, 0xf5, 0x85, 0x7e, 0xff,
    0x00, 0xa9,
];

/// Associated Token Account Program: `ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`.
pub const ASSOCIATED_TOKEN_PROGRAM_ID: [u8; 32] = [
    0x8c, 0x97, 0x25, 0x8f, 0x4e, 0x24, 0x89, 0xf1, 0xbb, 0x3d, 0x10, 0x29, 0x14, 0x8e, 0x0d,
    0x83, 0x0b, 0x5a, 0x13, 0x99, 0xda, 0xff, 0x10, 0x84, 0x04, 0x8e, 0x7b, 0xd8, 0xdb, 0xe9,
    0xf8, 0x59,
];

/// Metaplex Token Metadata Program: `metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s`.
pub const METADATA_PROGRAM_ID: [u8; 32] = [
    0x0b, 0x70, 0x65, 0xb1, 0xe3, 0xd1, 0x7c, 0x45, 0x38, 0x9d, 0x52, 0x7f, 0x6b, 0x04, 0xc3,
    0xcd, 0x58, 0xb8, 0x6c, 0x73, 0x1a, 0xa0, 0xfd, 0xb5, 0x49, 0xb6, 0xd1, 0xbc, 0x03, 0xf8,
    0x29, 0x46,
];

/// Byte size of an SPL Token mint account (no extensions).
pub const MINT_ACCOUNT_LEN: u64 = 82;

/// Maximum metadata name length in bytes (Metaplex on-chain limit).
pub const MAX_METADATA_NAME_BYTES: usize = 32;

/// Token symbol used for all message mints.
pub const MESSAGE_TOKEN_SYMBOL: &str = "MSG";

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

// ---------------------------------------------------------------------------
// Address derivation
// ---------------------------------------------------------------------------

/// Check if 32 bytes decompress to a valid Ed25519 curve point.
///
/// On-curve means the bytes could be a real wallet public key; program
/// derived addresses must be off-curve.
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    curve25519_dalek::edwards::CompressedEdwardsY(*bytes)
        .decompress()
        .is_some()
}

fn try_create_program_address(
    seeds: &[&[u8]],
    bump: u8,
    program_id: &[u8; 32],
) -> Option<[u8; 32]> {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update([bump]);
    hasher.update(program_id);
    hasher.update(PDA_MARKER);

    let hash: [u8; 32] = hasher.finalize().into();
    if is_on_curve(&hash) {
        return None;
    }
    Some(hash)
}

/// Find a program derived address for the given seeds, searching bump seeds
/// from 255 down.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &[u8; 32],
) -> Result<([u8; 32], u8), AppError> {
    for bump in (0u8..=255).rev() {
        if let Some(address) = try_create_program_address(seeds, bump, program_id) {
            return Ok((address, bump));
        }
    }
    Err(AppError::Chain(ChainError::InvalidTransaction(
        "could not find valid PDA bump seed".to_string(),
    )))
}

/// Derive the associated token account for a wallet + mint pair.
pub fn derive_associated_token_address(
    wallet: &[u8; 32],
    mint: &[u8; 32],
) -> Result<[u8; 32], AppError> {
    find_program_address(
        &[wallet.as_ref(), &TOKEN_PROGRAM_ID, mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map(|(address, _bump)| address)
}

/// Derive the Metaplex metadata account for a mint.
pub fn derive_metadata_address(mint: &[u8; 32]) -> Result<[u8; 32], AppError> {
    find_program_address(
        &[b"metadata", &METADATA_PROGRAM_ID, mint.as_ref()],
        &METADATA_PROGRAM_ID,
    )
    .map(|(address, _bump)| address)
}

// ---------------------------------------------------------------------------
// Metadata name truncation
// ---------------------------------------------------------------------------

/// Fit a message into the 32-byte metadata name field.
///
/// Messages at or under the limit pass through trimmed. Longer messages are
/// cut on a UTF-8 character boundary and suffixed with an ellipsis, keeping
/// the total within 32 bytes.
pub fn metadata_name(message: &str) -> String {
    const ELLIPSIS: &str = "\u{2026}"; // 3 bytes in UTF-8

    let trimmed = message.trim();
    if trimmed.len() <= MAX_METADATA_NAME_BYTES {
        return trimmed.to_string();
    }

    let budget = MAX_METADATA_NAME_BYTES - ELLIPSIS.len();
    let mut cut = budget;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }

    format!("{}{ELLIPSIS}", &trimmed[..cut])
}

// ---------------------------------------------------------------------------
// Instruction builders
// ---------------------------------------------------------------------------

/// System Program `CreateAccount`: fund and allocate the mint account.
///
/// Both the funder and the new account must sign; the mint keypair signature
/// is supplied server-side during partial signing.
pub fn build_create_account(
    funder: &[u8; 32],
    new_account: &[u8; 32],
    lamports: u64,
    space: u64,
    owner: &[u8; 32],
) -> Instruction {
    // u32 LE instruction index (0 = CreateAccount) + lamports + space + owner.
    let mut data = Vec::with_capacity(4 + 8 + 8 + 32);
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    data.extend_from_slice(&space.to_le_bytes());
    data.extend_from_slice(owner);

    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::signer(*funder, true),
            AccountMeta::signer(*new_account, true),
        ],
        data,
    }
}

/// SPL Token `InitializeMint2` with a fixed freeze authority.
pub fn build_initialize_mint2(
    mint: &[u8; 32],
    decimals: u8,
    mint_authority: &[u8; 32],
    freeze_authority: &[u8; 32],
) -> Instruction {
    // [20, decimals, mint_authority, 1, freeze_authority]
    let mut data = Vec::with_capacity(2 + 32 + 1 + 32);
    data.push(20u8);
    data.push(decimals);
    data.extend_from_slice(mint_authority);
    data.push(1u8); // COption::Some
    data.extend_from_slice(freeze_authority);

    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![AccountMeta::writable(*mint)],
        data,
    }
}

/// Associated Token Account `Create` for the receiver.
pub fn build_create_associated_token_account(
    payer: &[u8; 32],
    associated_account: &[u8; 32],
    owner: &[u8; 32],
    mint: &[u8; 32],
) -> Instruction {
    Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::signer(*payer, true),
            AccountMeta::writable(*associated_account),
            AccountMeta::readonly(*owner),
            AccountMeta::readonly(*mint),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID),
            AccountMeta::readonly(TOKEN_PROGRAM_ID),
        ],
        data: Vec::new(),
    }
}

/// SPL Token `MintTo`.
pub fn build_mint_to(
    mint: &[u8; 32],
    destination: &[u8; 32],
    authority: &[u8; 32],
    amount: u64,
) -> Instruction {
    // [7] (MintTo) + u64 LE amount = 9 bytes.
    let mut data = Vec::with_capacity(9);
    data.push(7u8);
    data.extend_from_slice(&amount.to_le_bytes());

    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(*mint),
            AccountMeta::writable(*destination),
            AccountMeta::signer(*authority, false),
        ],
        data,
    }
}

fn borsh_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Metaplex `CreateMetadataAccountV3` attaching the message as token name.
///
/// `DataV2` is borsh-encoded with no creators, collection, or uses; the
/// metadata stays mutable by the update authority.
pub fn build_create_metadata_v3(
    metadata_account: &[u8; 32],
    mint: &[u8; 32],
    mint_authority: &[u8; 32],
    payer: &[u8; 32],
    update_authority: &[u8; 32],
    name: &str,
    symbol: &str,
    uri: &str,
) -> Instruction {
    let mut data = Vec::with_capacity(1 + 4 + name.len() + 4 + symbol.len() + 4 + uri.len() + 6);
    data.push(33u8); // CreateMetadataAccountV3 discriminator
    borsh_string(&mut data, name);
    borsh_string(&mut data, symbol);
    borsh_string(&mut data, uri);
    data.extend_from_slice(&0u16.to_le_bytes()); // seller_fee_basis_points
    data.push(0u8); // creators: None
    data.push(0u8); // collection: None
    data.push(0u8); // uses: None
    data.push(1u8); // is_mutable
    data.push(0u8); // collection_details: None

    Instruction {
        program_id: METADATA_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(*metadata_account),
            AccountMeta::readonly(*mint),
            AccountMeta::signer(*mint_authority, false),
            AccountMeta::signer(*payer, true),
            AccountMeta::readonly(*update_authority),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID),
        ],
        data,
    }
}
