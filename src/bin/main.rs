use conversation_context::conversational::ConversationContextEngine;
use tracing::info;
use uuid::Uuid;

/// A short scripted conversation: (user message, agent response)
const SCRIPT: &[(&str, &str)] = &[
    (
        "Do you have hydraulic pumps?",
        "We have [Pump A](https://shop.example.com/p/pump-a) and \
         [Pump B](https://shop.example.com/p/pump-b). See the [install guide](https://shop.example.com/docs/pumps.pdf).",
    ),
    (
        "What's the price of it?",
        "Here are the current prices:\n1. Pump A - $450\n2. Pump B - $520\n3. Pump C - $610",
    ),
    (
        "Tell me about item 2",
        "Pump B is a 2 HP gear pump. Your last purchase was order #48213.",
    ),
    (
        "Sorry I meant ZF4 not ZF5",
        "No problem, I'll look for ZF4 compatible pumps.",
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let engine = ConversationContextEngine::from_env();

    let conversation_id = Uuid::new_v4();
    info!(conversation_id = %conversation_id, "Replaying scripted conversation");

    for (user_message, agent_response) in SCRIPT {
        let context = engine.process_turn_start(conversation_id).await?;

        println!("\n=== TURN {} ===", context.turn);
        if let Some(prompt_context) = context.prompt_context() {
            println!("{}", prompt_context);
        }
        println!("User: {}", user_message);

        let manager = engine.load_manager(conversation_id).await?;
        for mention in manager.resolve_mentions(user_message) {
            println!(
                "  \"{}\" -> {}",
                mention.token,
                mention.resolution.value().unwrap_or("(unresolved)")
            );
        }

        println!("Agent: {}", agent_response);
        let outcome = engine
            .process_turn_end(conversation_id, user_message, agent_response)
            .await?;
        println!(
            "  recorded: {} correction(s), {} entity mention(s), {} list(s)",
            outcome.corrections_added, outcome.entities_tracked, outcome.lists_added
        );
    }

    let manager = engine.load_manager(conversation_id).await?;
    println!("\n=== FINAL STATE ===");
    println!("{}", manager.serialize()?);

    Ok(())
}
