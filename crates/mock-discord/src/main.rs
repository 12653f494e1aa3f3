use mock_discord::{MockDiscord, MockRole};

const DEMO_GUILD: &str = "100000000000000001";
const DEMO_ROLE: &str = "200000000000000001";
const DEMO_ADMIN_ROLE: &str = "200000000000000002";
const DEMO_USER: &str = "300000000000000001";

#[tokio::main]
async fn main() {
    let client_id = std::env::var("CLIENT_ID").unwrap_or_else(|_| "mock-client".to_string());
    let client_secret =
        std::env::var("CLIENT_SECRET").unwrap_or_else(|_| "mock-secret".to_string());
    let bot_token = std::env::var("BOT_TOKEN").unwrap_or_else(|_| "mock-bot-token".to_string());

    // Seed one guild with a harmless role, an admin role and a single member.
    let discord = MockDiscord::new(&client_id, &client_secret, &bot_token)
        .with_role(DEMO_GUILD, MockRole::new(DEMO_ROLE, "Verified", 0))
        .with_role(DEMO_GUILD, MockRole::new(DEMO_ADMIN_ROLE, "Staff", 1 << 3))
        .with_member(DEMO_GUILD, DEMO_USER);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:4000").await.unwrap();
    println!("MOCK-DISCORD: Listening on http://localhost:4000/api");
    println!("MOCK-DISCORD: guild={DEMO_GUILD} role={DEMO_ROLE} member code={DEMO_USER}");
    axum::serve(listener, discord.router()).await.unwrap();
}
