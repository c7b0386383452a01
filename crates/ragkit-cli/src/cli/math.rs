use super::Session;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use ragkit::math::{CalculateRequest, MathClient, Operation};

#[derive(Args)]
pub struct MathArgs {
    /// Math service URL (overrides [math] url)
    #[arg(long)]
    math_url: Option<String>,

    #[command(subcommand)]
    command: MathCommands,
}

#[derive(Subcommand)]
enum MathCommands {
    /// Check that the math service is up
    Health,

    /// List the tools the math service exposes
    Tools,

    /// Run one calculation
    Calc(CalcArgs),
}

#[derive(Args)]
struct CalcArgs {
    /// Operation: add, subtract, multiply, divide, power, sqrt, abs, factorial
    operation: Operation,

    #[arg(long, allow_negative_numbers = true)]
    a: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    b: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    value: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    base: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    exponent: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    n: Option<i64>,
}

impl From<CalcArgs> for CalculateRequest {
    fn from(args: CalcArgs) -> Self {
        Self {
            operation: args.operation.name().to_string(),
            a: args.a,
            b: args.b,
            value: args.value,
            base: args.base,
            exponent: args.exponent,
            n: args.n,
        }
    }
}

pub async fn execute(session: &Session, args: MathArgs) -> Result<()> {
    let url = args.math_url.unwrap_or_else(|| session.config.math.url.clone());
    let client = MathClient::new(&url);

    match args.command {
        MathCommands::Health => {
            let status = client.health().await?;
            println!("Math service at {}: {}", client.base_url(), status);
        },

        MathCommands::Tools => {
            let tools = client.list_tools().await?;
            println!("Found {} tools:", tools.len());
            for tool in tools {
                println!("  {} ({})", tool.name, tool.required().join(", "));
                println!("      {}", tool.description);
            }
        },

        MathCommands::Calc(calc) => {
            let request = CalculateRequest::from(calc);
            let result = client
                .calculate(&request)
                .await
                .with_context(|| format!("Failed to calculate {}", request.operation))?;
            println!("{}", result.message);
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: CalcArgs,
    }

    #[test]
    fn calc_args_build_a_request() {
        let harness =
            Harness::try_parse_from(["calc", "divide", "--a", "-8", "--b", "2"]).unwrap();
        let request = CalculateRequest::from(harness.args);
        assert_eq!(request, CalculateRequest::binary("divide", -8.0, 2.0));
    }

    #[test]
    fn operation_names_are_case_insensitive() {
        let harness = Harness::try_parse_from(["calc", "FACTORIAL", "--n", "5"]).unwrap();
        let request = CalculateRequest::from(harness.args);
        assert_eq!(request.operation, "factorial");
        assert_eq!(request.n, Some(5));
    }

    #[test]
    fn unknown_operation_is_rejected() {
        assert!(Harness::try_parse_from(["calc", "modulo"]).is_err());
    }
}
