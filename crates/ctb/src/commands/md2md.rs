//! `ctb md2md` command implementation.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::Args;
use ctb_config::{CliSettings, Config};
use ctb_markdown::{ConvertOptions, Converter, Mode, ParseOptions};

use crate::error::CliError;
use crate::output::Output;

/// Path argument meaning stdin or stdout.
const STDIO: &str = "-";

/// Arguments for the md2md command.
#[derive(Args)]
pub(crate) struct Md2MdArgs {
    /// Source Markdown file, `-` for stdin.
    src: PathBuf,

    /// Destination file, `-` for stdout.
    dst: PathBuf,

    /// Render HTML instead of Markdown.
    #[arg(long)]
    md2html: bool,

    /// Dump the document tree to stderr.
    #[arg(long, alias = "dumpAST")]
    dump_ast: bool,

    /// Prefix padding with a running counter (overrides config).
    #[arg(long)]
    verbose_padding: bool,

    /// Path to configuration file (default: auto-discover ctb.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Md2MdArgs {
    /// Execute the md2md command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the source cannot be read,
    /// rendering fails or the destination cannot be written.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            verbose_padding: self.verbose_padding.then_some(true),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        if let Some(path) = &config.config_path {
            tracing::info!(path = %path.display(), "Loaded configuration");
        }

        let mode = if self.md2html {
            Mode::Html
        } else {
            Mode::Markdown
        };
        let converter = Converter::with_options(mode, convert_options(&config, mode))?;

        let source = read_source(&self.src)?;
        let doc = converter.parse(&source);
        if self.dump_ast {
            output.tree(&doc);
        }

        if is_stdio(&self.dst) {
            converter.render(&doc, io::stdout().lock())?;
        } else {
            converter.render(&doc, File::create(&self.dst)?)?;
            output.wrote(&self.dst, std::fs::metadata(&self.dst)?.len());
        }

        tracing::info!(mode = ?mode, bytes = source.len(), "Converted document");
        Ok(())
    }
}

/// Map configuration onto converter options for `mode`.
fn convert_options(config: &Config, mode: Mode) -> ConvertOptions {
    let parser = &config.parser;
    let parse = ParseOptions {
        heading_attributes: parser.heading_attributes,
        tables: parser.tables,
        definition_lists: parser.definition_lists,
        linkify: parser.linkify,
        smart_punctuation: mode == Mode::Html && config.html.smart_punctuation,
    };
    ConvertOptions {
        parse,
        heading_ids: config.html.heading_ids,
        secure_links: config.html.external_links,
        verbose_padding: config.markdown.verbose_padding,
    }
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == STDIO
}

fn read_source(path: &Path) -> Result<String, CliError> {
    let mut source = String::new();
    let result = if is_stdio(path) {
        io::stdin().lock().read_to_string(&mut source)
    } else {
        File::open(path).and_then(|mut file| file.read_to_string(&mut source))
    };
    result.map_err(|err| CliError::Input {
        path: path.display().to_string(),
        source: err,
    })?;
    Ok(source)
}
