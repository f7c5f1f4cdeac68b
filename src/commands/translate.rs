use super::Host;
use crate::Result;
use crate::cel::translate;
use clap::Parser;
use ohno::IntoAppError;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct TranslateArgs {
    /// The CEL expression to translate
    #[arg(value_name = "EXPRESSION")]
    pub expression: String,
}

/// Prints the restricted-grammar form of a CEL expression
pub fn translate_expression<H: Host>(host: &mut H, args: &TranslateArgs) -> Result<()> {
    match translate(&args.expression).into_app_err("translating CEL expression") {
        Ok(translated) => {
            let _ = writeln!(host.output(), "{translated}");
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Translation failed: {e}");
            host.exit(1);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;

    #[test]
    fn test_translate_prints_result() {
        let mut host = TestHost::new();
        let args = TranslateArgs {
            expression: "env.NIM_PORT.matches('^[0-9]+$') && !has(env.DEBUG)".to_string(),
        };
        translate_expression(&mut host, &args).unwrap();
        insta::assert_snapshot!(host.output_text(), @"cel_matches(env.NIM_PORT, '^[0-9]+$')  and  not cel_has(env.DEBUG)");
    }

    #[test]
    fn test_translate_unbalanced() {
        let mut host = TestHost::new();
        let args = TranslateArgs {
            expression: "x.matches('a'".to_string(),
        };
        assert!(translate_expression(&mut host, &args).is_err());
        assert!(host.error_text().contains("Unbalanced parentheses in matches()"));
        assert_eq!(host.exit_code, Some(1));
    }
}
