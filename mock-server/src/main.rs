use mock_server::MockConfig;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let mut config = MockConfig::default();
    if let Ok(api_key) = std::env::var("MOCK_API_KEY") {
        config.api_key = api_key;
    }
    if let Ok(auth_token) = std::env::var("MOCK_AUTH_TOKEN") {
        config.auth_token = auth_token;
    }

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("listening on {addr} (api key {:?})", config.api_key);
    mock_server::run(listener, config).await
}
