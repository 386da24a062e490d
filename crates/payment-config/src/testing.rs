//! Configuration fixtures shared by tests across the workspace.

/// A complete, valid configuration with two networks and the in-memory oracle.
pub const SAMPLE_CONFIG: &str = r#"
[router]
id = "test-router"

[networks.1]
rpc_url = "${PAYMENT_TEST_RPC:-http://localhost:8545}"
erc20_proxy_address = "0x370DE27fdb7D1Ff1e1BaA7D11c5820a324Cf623C"
eth_proxy_address = "0x37a8f5f64f2a84f2377481537f04d2a59c9f59b6"

[networks.5]
rpc_url = "http://localhost:8546"
erc20_proxy_address = "0x2C2B9C9a4a25e24B174f26114e8926a9f2128FE4"
eth_proxy_address = "0x9c6c7817e3679c4b3f9ef9486001eae5aaed25ff"

[oracle]
primary = "memory"
[oracle.implementations.memory]
"#;
