use super::Host;
use crate::Result;
use crate::cel::CelEvaluator;
use crate::config::{Config, MAX_CONFIGURABLE_DEPTH};
use crate::expr::{Context, Evaluator};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ohno::{IntoAppError, bail};
use std::fs;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct EvalArgs {
    /// The expression to evaluate
    #[arg(value_name = "EXPRESSION")]
    pub expression: String,

    /// JSON or YAML file whose top-level object supplies the variables
    #[arg(long, value_name = "PATH")]
    pub context: Option<Utf8PathBuf>,

    /// Treat the expression as CEL and print whether it matched
    #[arg(long)]
    pub cel: bool,

    /// Nesting bound, overriding the configured one
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,
}

fn load_context(path: &Utf8Path) -> Result<Context> {
    let text = fs::read_to_string(path).into_app_err_with(|| format!("reading context file '{path}'"))?;
    let value: serde_json::Value = if path.extension() == Some("json") {
        serde_json::from_str(&text).into_app_err_with(|| format!("parsing context file '{path}'"))?
    } else {
        serde_yaml::from_str(&text).into_app_err_with(|| format!("parsing context file '{path}'"))?
    };

    match value {
        serde_json::Value::Null => Ok(Context::new()),
        value => Context::from_json(value).into_app_err_with(|| format!("context file '{path}' must hold a mapping")),
    }
}

fn eval_inner(args: &EvalArgs, config: &Config) -> Result<String> {
    let context = args.context.as_deref().map(load_context).transpose()?.unwrap_or_default();

    if let Some(depth) = args.max_depth
        && !(1..=MAX_CONFIGURABLE_DEPTH).contains(&depth)
    {
        bail!("--max-depth must be between 1 and {MAX_CONFIGURABLE_DEPTH}, got {depth}");
    }

    if args.cel {
        let evaluator = CelEvaluator::new(args.max_depth.unwrap_or(config.cel_max_depth));
        let matched = evaluator.evaluate(&args.expression, &context).into_app_err("evaluating CEL expression")?;
        Ok(if matched { "true" } else { "false" }.to_string())
    } else {
        let evaluator = Evaluator::new().with_max_depth(args.max_depth.unwrap_or(config.max_depth));
        let value = evaluator.evaluate(&args.expression, &context).into_app_err("evaluating expression")?;
        Ok(value.repr())
    }
}

pub fn eval_expression<H: Host>(host: &mut H, args: &EvalArgs, config: &Config) -> Result<()> {
    match eval_inner(args, config) {
        Ok(text) => {
            let _ = writeln!(host.output(), "{text}");
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Evaluation failed: {e}");
            host.exit(1);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;

    fn args(expression: &str) -> EvalArgs {
        EvalArgs {
            expression: expression.to_string(),
            context: None,
            cel: false,
            max_depth: None,
        }
    }

    fn eval(args: &EvalArgs) -> (Result<()>, TestHost) {
        let mut host = TestHost::new();
        let result = eval_expression(&mut host, args, &Config::default());
        (result, host)
    }

    #[test]
    fn test_eval_prints_repr() {
        let (result, host) = eval(&args("'nim' + '-' + str(1 + 2)"));
        result.unwrap();
        assert_eq!(host.output_text(), "'nim-3'\n");
    }

    #[test]
    fn test_eval_cel() {
        let mut cel_args = args("size([1, 2, 3]) == 3 && !false");
        cel_args.cel = true;
        let (result, host) = eval(&cel_args);
        result.unwrap();
        assert_eq!(host.output_text(), "true\n");
    }

    #[test]
    fn test_eval_unknown_variable() {
        let (result, host) = eval(&args("gpu_count > 1"));
        assert!(result.is_err());
        assert!(host.error_text().contains("Unknown variable: gpu_count"), "{}", host.error_text());
        assert_eq!(host.exit_code, Some(1));
    }

    #[test]
    fn test_eval_max_depth_out_of_range() {
        let mut depth_args = args("1");
        depth_args.max_depth = Some(0);
        let (result, _) = eval(&depth_args);
        assert!(result.is_err());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_eval_with_yaml_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("ctx.yml")).unwrap();
        fs::write(&path, "labels:\n  tier: gold\nreplicas: 3\n").unwrap();

        let mut ctx_args = args("labels['tier'] == 'gold' and replicas >= 2");
        ctx_args.context = Some(path);
        let (result, host) = eval(&ctx_args);
        result.unwrap();
        assert_eq!(host.output_text(), "True\n");
    }
}
