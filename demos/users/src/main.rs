//! Users Example
//!
//! Demonstrates ferrule's step pipeline against the JSONPlaceholder API.

// Example-specific lint allowances
#![allow(missing_docs)]
#![allow(clippy::print_stdout)]

use ferrule::middleware::CacheConfig;
use ferrule::prelude::*;
use ferrule::steps::camel_case;
use serde::de::DeserializeOwned;
use serde_json::Value;

// ============================================================================
// Data Types
// ============================================================================

/// A JSONPlaceholder user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub company: Company,
}

/// The company a user works for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub name: String,
    pub catch_phrase: String,
}

/// A todo item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: u64,
    pub user_id: u64,
    pub title: String,
    pub completed: bool,
}

// ============================================================================
// Client
// ============================================================================

const USER_AGENT: &str = "ferrule-users-demo/0.1.0";

/// Stamps every outgoing request with a `User-Agent` header.
fn user_agent() -> Step<Response> {
    Step::new("user-agent")
        .before(|config| async move { Ok(config.header("User-Agent", USER_AGENT)) })
}

/// Client producing camelCased JSON values.
pub fn users_client(base_url: impl Into<String>) -> Result<Client<Value>> {
    Client::builder()
        .base_url(base_url)
        .header("Accept", "application/json")
        .with_timing()
        .with_cache(CacheConfig::new())
        .step(user_agent())
        .step(retry(2))
        .step(json::<Value>())
        .step(camel_case())
        .build()
}

fn typed<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|err| Error::json_deserialization("", err.to_string()))
}

/// `GET /users`
///
/// Before-steps only see calls made with a config, hence the empty one.
pub async fn list_users(client: &Client<Value>) -> Result<Vec<User>> {
    typed(client.get("/users", Some(&RequestConfig::new())).await?)
}

/// `GET /todos?userId={user}`
pub async fn list_todos(client: &Client<Value>, user: u64) -> Result<Vec<Todo>> {
    let config = RequestConfig::new().query("userId", user);
    typed(client.get("/todos", Some(&config)).await?)
}

// ============================================================================
// Main: Demonstrate usage
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let client = users_client("https://jsonplaceholder.typicode.com")?;

    let names = client
        .list_steps()
        .into_iter()
        .map(|step| step.name)
        .collect::<Vec<_>>();
    println!("Registered steps: {}", names.join(" > "));

    let users = list_users(&client).await?;
    println!("\n=== {} users ===", users.len());
    for user in &users {
        println!("{:>3} {} <{}> at {}", user.id, user.name, user.email, user.company.name);
    }

    if let Some(first) = users.first() {
        let todos = list_todos(&client, first.id).await?;
        let done = todos.iter().filter(|todo| todo.completed).count();
        println!("\n{} has {done}/{} todos completed", first.name, todos.len());
    }

    // Without the key rewrite
    let raw = client
        .get("/users/1", Some(&RequestConfig::new().exclude("camel-case")))
        .await?;
    println!("\nRaw user #1: {raw}");

    // Copies share the registry
    let copy = client.copy();
    copy.remove_step("user-agent")?;
    println!("\nSteps after removal: {}", client.list_steps().len());

    Ok(())
}

// ============================================================================
// Tests using wiremock
// ============================================================================
