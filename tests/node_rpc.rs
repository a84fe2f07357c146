//! `NodeClient` against a mocked node RPC endpoint.

use juno_miner_rs::MinerError;
use juno_miner_rs::network::{NodeClient, NodeConfig, SubmitOutcome};
use mockito::{Matcher, Server};
use serde_json::json;

fn client(url: String) -> NodeClient {
    NodeClient::new(NodeConfig {
        rpc_url: url,
        rpc_user: "miner".into(),
        rpc_password: "secret".into(),
    })
    .unwrap()
}

#[tokio::test]
async fn test_block_template_request_and_parse() {
    let mut server = Server::new_async().await;
    let template = json!({
        "version": 4,
        "previousblockhash": "23d39ee3ec4600c3f507230519a64ea5f6c444b22e85633a9526289127f4aa17",
        "curtime": 1760323089u32,
        "bits": "1f09daa8",
        "height": 1583,
        "randomxseedheight": 0,
        "randomxseedhash": "0101010101010101010101010101010101010101010101010101010101010101",
        "defaultroots": {
            "merkleroot": "cf56010cd2de6b1323a0b0cf5f8f7354a4fa41c492eae5861c7929f2673e4f8e",
            "blockcommitmentshash": "bf9cd388aa99b6d79402d285567ea326025936ef92d5a4c1ab7ae732acb942f5"
        },
        "coinbasetxn": { "data": "0400008085202f89" },
        "transactions": []
    });

    let mock = server
        .mock("POST", "/")
        // "miner:secret"
        .match_header("authorization", "Basic bWluZXI6c2VjcmV0")
        .match_body(Matcher::PartialJson(json!({
            "jsonrpc": "1.0",
            "method": "getblocktemplate",
            "params": [{ "capabilities": ["coinbasetxn", "workid", "coinbase/append"] }]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "result": template, "error": null, "id": 1 }).to_string())
        .create_async()
        .await;

    let template = client(server.url()).get_block_template().await.unwrap();
    assert_eq!(template.height, 1583);
    assert_eq!(template.seed_hash, [1u8; 32]);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_body_on_server_error_status() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "result": null,
                "error": { "code": -9, "message": "Node is not connected" },
                "id": 1
            })
            .to_string(),
        )
        .create_async()
        .await;

    match client(server.url()).get_blockchain_info().await {
        Err(MinerError::RpcError(msg)) => assert_eq!(msg, "Node is not connected"),
        other => panic!("unexpected {:?}", other),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_duplicate_submission_counts_as_stored() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({
            "method": "submitblock",
            "params": ["00ff"]
        })))
        .with_status(200)
        .with_body(json!({ "result": "duplicate", "error": null, "id": 1 }).to_string())
        .create_async()
        .await;

    let outcome = client(server.url()).submit_block("00ff").await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Duplicate("duplicate".into()));
    assert!(outcome.is_stored());

    mock.assert_async().await;
}

#[tokio::test]
async fn test_request_ids_increase() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({ "id": 1 })))
        .with_body(json!({ "result": { "blocks": 10 }, "error": null, "id": 1 }).to_string())
        .create_async()
        .await;
    let second = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({ "id": 2 })))
        .with_body(json!({ "result": { "blocks": 11 }, "error": null, "id": 2 }).to_string())
        .create_async()
        .await;

    let node = client(server.url());
    assert_eq!(node.get_mining_info().await.unwrap().blocks, 10);
    assert_eq!(node.get_mining_info().await.unwrap().blocks, 11);

    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_node_is_http_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    drop(listener);

    let err = client(url).get_mining_info().await.unwrap_err();
    assert!(matches!(err, MinerError::HttpError(_)));
}
