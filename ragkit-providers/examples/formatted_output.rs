//! Structured output: ask for JSON matching a schema and deserialize it
//!
//! Run with: cargo run --example formatted_output --features ollama

use ragkit_core::logging::init_stdout_logging;
use ragkit_core::prelude::*;
use ragkit_providers::ollama::Ollama;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A random fantasy character for a novel
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NovelCharacter {
    name: String,
    background_story: String,
    town: String,
    age: u32,
    occupation: String,
    race: String,
    friends: Vec<String>,
    personality_traits: Vec<String>,
}

fn character_schema() -> serde_json::Value {
    let text = |description: &str| json!({"type": "string", "description": description});
    let list = |description: &str| {
        json!({"type": "array", "items": {"type": "string"}, "description": description})
    };
    json!({
        "type": "object",
        "properties": {
            "name": text("The character's name"),
            "backgroundStory": text("The character's background story"),
            "town": text("The name of the town the character lives in"),
            "age": {"type": "integer", "description": "The character's age"},
            "occupation": text("The job the character has in town"),
            "race": text("The character's race"),
            "friends": list("Names of the character's friends"),
            "personalityTraits": list("The character's personality traits"),
        },
        "required": [
            "name", "backgroundStory", "town", "age",
            "occupation", "race", "friends", "personalityTraits"
        ],
        "additionalProperties": false,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = RagConfig::from_env()?;
    init_stdout_logging(&config.log_level)?;

    let provider = Ollama::from_config(&config)?;

    let request = ChatRequest::new(
        config.language_model.clone(),
        vec![Message::user(
            "You are a service that generates a random fantasy character for a novel.",
        )],
    )
    .with_json_schema("novel_character", character_schema());

    let reply = provider.complete(request).await?;
    let character: NovelCharacter = serde_json::from_str(&reply)?;

    println!("{}", serde_json::to_string_pretty(&character)?);
    Ok(())
}
