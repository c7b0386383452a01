use super::chat::answer;
use super::Session;
use anyhow::Result;
use clap::Args;
use ragkit::services::routing::{synthesis_prompt, DEMO_SUBTASKS, DEMO_TASK};
use ragkit::services::{ResolveNeeds, Route, TaskRouter};

/// Environment variables whose presence means web search is configured
const WEB_SEARCH_KEYS: &[&str] = &["TAVILY_SEARCH_API_KEY", "BRAVE_SEARCH_API_KEY"];

#[derive(Args)]
pub struct RouteArgs {
    /// Subtask to route (repeatable; defaults to the demo subtasks)
    #[arg(long = "task")]
    tasks: Vec<String>,

    /// Print the chosen routes without calling the server
    #[arg(long)]
    dry_run: bool,

    /// Treat web search as available even without an API key in the environment
    #[arg(long)]
    web_search: bool,
}

fn web_search_available(flag: bool) -> bool {
    flag || WEB_SEARCH_KEYS
        .iter()
        .any(|key| std::env::var(key).is_ok_and(|v| !v.trim().is_empty()))
}

pub async fn execute(session: &Session, args: RouteArgs) -> Result<()> {
    let router = TaskRouter::new(web_search_available(args.web_search));
    let tasks: Vec<String> = if args.tasks.is_empty() {
        println!("[task] {}", DEMO_TASK);
        DEMO_SUBTASKS.iter().map(|t| t.to_string()).collect()
    } else {
        args.tasks
    };

    let routed: Vec<(Route, String)> = tasks
        .into_iter()
        .map(|task| (router.route(&task), task))
        .collect();
    for (route, task) in &routed {
        println!("[route] {} <- {}", route, task);
    }

    if args.dry_run {
        return Ok(());
    }

    let resolved = session.resolve(ResolveNeeds::chat()).await?;
    let model = resolved.chat_model()?;

    let mut results = Vec::with_capacity(routed.len());
    for (route, task) in routed {
        let reply = answer(session, model, route.instructions(), &task).await?;
        println!("[{}] {}", route, reply);
        results.push((task, reply));
    }

    let summary = answer(
        session,
        model,
        Route::General.instructions(),
        &synthesis_prompt(&results),
    )
    .await?;
    println!("[summary] {}", summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flag_enables_web_search() {
        assert!(web_search_available(true));
    }
}
