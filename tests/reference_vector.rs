//! Hashes the solved header of block 1583 with the real RandomX backend.
//!
//! Builds a 256 MiB cache, so it only runs on request:
//! `cargo test --release -- --ignored`

use juno_miner_rs::miner::randomx::{RandomXBackend, VmMemory};
use juno_miner_rs::template::{BlockTemplate, HEADER_PREFIX_LEN, hash_meets_target};
use juno_miner_rs::utils::digest::decode_display_digest;
use juno_miner_rs::RustRandomX;
use serde_json::json;

const SEED: &[u8] = b"ZcashRandomXPoW";
const NONCE: &str = "00004b208177028c86cd2875902953277897cebc15806b139d16c180b25a1262";
const EXPECTED: &str = "4268bf0d59a72f3f086020274dcc869164c092442ecc52246d6e760b28a80500";

fn block_1583() -> BlockTemplate {
    let doc = json!({
        "version": 4,
        "previousblockhash": "23d39ee3ec4600c3f507230519a64ea5f6c444b22e85633a9526289127f4aa17",
        "curtime": 1760323089u32,
        "bits": "1f09daa8",
        "height": 1583,
        "randomxseedheight": 0,
        "randomxseedhash": "0000000000000000000000000000000000000000000000000000000000000000",
        "defaultroots": {
            "merkleroot": "cf56010cd2de6b1323a0b0cf5f8f7354a4fa41c492eae5861c7929f2673e4f8e",
            "blockcommitmentshash": "bf9cd388aa99b6d79402d285567ea326025936ef92d5a4c1ab7ae732acb942f5"
        },
        "coinbasetxn": { "data": "00" }
    });
    BlockTemplate::parse(&doc).unwrap()
}

#[test]
#[ignore = "builds a full RandomX cache"]
fn block_1583_digest_matches() {
    let template = block_1583();
    let mut header = *template.header_base();
    header[HEADER_PREFIX_LEN..].copy_from_slice(&decode_display_digest("nonce", NONCE).unwrap());

    let backend = RustRandomX::new();
    let mut cache = backend.alloc_cache().unwrap();
    backend.init_cache(&mut cache, SEED).unwrap();
    let mut vm = backend.create_vm(VmMemory::Light(&cache)).unwrap();

    let digest = backend.hash(&mut vm, &header);
    assert_eq!(hex::encode(digest), EXPECTED);
    assert!(hash_meets_target(&digest, &template.target));
}
