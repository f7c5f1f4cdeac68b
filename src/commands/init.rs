use super::Host;
use crate::Result;
use crate::config::Config;
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Output configuration file path
    #[arg(value_name = "PATH", default_value = "nim-audit.yml")]
    pub output: Utf8PathBuf,
}

pub fn init_config<H: Host>(host: &mut H, args: &InitArgs) -> Result<()> {
    Config::save_default(&args.output)?;
    let _ = writeln!(host.output(), "Generated default configuration file: {}", args.output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;
    use crate::config::DEFAULT_CONFIG_YAML;

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_init_writes_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let output = Utf8PathBuf::from_path_buf(dir.path().join("nim-audit.yml")).unwrap();

        let mut host = TestHost::new();
        init_config(&mut host, &InitArgs { output: output.clone() }).unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), DEFAULT_CONFIG_YAML);
        assert_eq!(host.output_text(), format!("Generated default configuration file: {output}\n"));
    }

    #[test]
    fn test_init_into_missing_directory() {
        let mut host = TestHost::new();
        let args = InitArgs {
            output: Utf8PathBuf::from("no/such/dir/nim-audit.yml"),
        };
        assert!(init_config(&mut host, &args).is_err());
    }
}
