use super::Session;
use anyhow::{Context, Result};
use clap::Args;
use futures::StreamExt;
use ragkit::client::{ChatMessage, ChatRequest};
use ragkit::services::ResolveNeeds;
use std::io::Write;

#[derive(Args)]
pub struct ChatArgs {
    /// User prompt; repeat for a multi-turn conversation
    #[arg(long, required = true)]
    prompt: Vec<String>,

    /// Optional system prompt
    #[arg(long)]
    system: Option<String>,

    /// Print the answer token by token as it arrives
    #[arg(long)]
    stream: bool,
}

/// Client-side dialogue history, resent in full on every turn
struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    fn new(system: Option<&str>) -> Self {
        Self {
            messages: system.map(ChatMessage::system).into_iter().collect(),
        }
    }

    /// Append a user turn and return the messages to send
    fn ask(&mut self, prompt: &str) -> &[ChatMessage] {
        self.messages.push(ChatMessage::user(prompt));
        &self.messages
    }

    fn reply(&mut self, content: String) {
        self.messages.push(ChatMessage::assistant(content));
    }
}

/// Build the message list for a single-turn chat
fn messages(system: Option<&str>, prompt: &str) -> Vec<ChatMessage> {
    let mut conversation = Conversation::new(system);
    conversation.ask(prompt);
    conversation.messages
}

pub async fn execute(session: &Session, args: ChatArgs) -> Result<()> {
    let resolved = session.resolve(ResolveNeeds::chat()).await?;
    let model = resolved.chat_model()?;
    let multi_turn = args.prompt.len() > 1;
    let mut conversation = Conversation::new(args.system.as_deref());

    for prompt in &args.prompt {
        if multi_turn {
            println!("User> {}", prompt);
        }
        let request = ChatRequest::new(model, conversation.ask(prompt).to_vec());
        let content = if args.stream {
            stream_reply(session, &request).await?
        } else {
            let completion = session
                .client
                .chat_completion(&request)
                .await
                .context("Chat completion failed")?;
            let content = completion.content().unwrap_or_default().to_string();
            println!("{}", content);
            content
        };
        conversation.reply(content);
    }
    Ok(())
}

/// Print deltas as they arrive and return the assembled reply
async fn stream_reply(session: &Session, request: &ChatRequest) -> Result<String> {
    let mut deltas = session
        .client
        .chat_completion_stream(request)
        .await
        .context("Failed to start streaming chat completion")?;
    let mut stdout = std::io::stdout();
    let mut content = String::new();
    while let Some(delta) = deltas.next().await {
        let delta = delta.context("Chat stream interrupted")?;
        write!(stdout, "{}", delta)?;
        stdout.flush()?;
        content.push_str(&delta);
    }
    writeln!(stdout)?;
    Ok(content)
}

/// Non-streaming answer from the resolved chat model
pub async fn answer(
    session: &Session,
    model: &str,
    system: &str,
    prompt: &str,
) -> Result<String> {
    let request = ChatRequest::new(model, messages(Some(system), prompt));
    let completion = session
        .client
        .chat_completion(&request)
        .await
        .context("Chat completion failed")?;
    Ok(completion.content().unwrap_or_default().trim().to_string())
}
