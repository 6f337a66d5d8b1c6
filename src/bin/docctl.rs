use std::path::PathBuf;
use std::process::exit;

use structopt::StructOpt;

use statedoc::{document_exists, load_document_contents, DocumentConfig, DocumentError, Result};

#[derive(StructOpt, Debug)]
#[structopt(name = "docctl")]
/// Inspect a journaled document store on disk without mutating it.
struct Options {
    #[structopt(subcommand)]
    cmd: SubCommand,
}

#[derive(StructOpt, Debug)]
enum SubCommand {
    /// Report whether a document exists at BASE-PATH
    Exists {
        #[structopt(name = "BASE-PATH")]
        base_path: PathBuf,
    },
    /// Recover and pretty-print a document's contents as JSON
    Dump {
        #[structopt(name = "BASE-PATH")]
        base_path: PathBuf,
        /// Schema type tag the journal header must match
        #[structopt(long, default_value = "document")]
        type_tag: String,
        /// Schema version the journal header must match
        #[structopt(long, default_value = "1")]
        version: u32,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let opts = Options::from_args();

    match opts.cmd {
        SubCommand::Exists { base_path } => {
            println!("{}", document_exists(&base_path));
        }
        SubCommand::Dump {
            base_path,
            type_tag,
            version,
        } => {
            // capacity/high_water are irrelevant for a read-only recovery,
            // but DocumentConfig bundles them; any values are fine here.
            let config = DocumentConfig::new(base_path, type_tag, version, 0, 0);
            match load_document_contents(&config) {
                Ok(doc) => {
                    let pretty = serde_json::to_string_pretty(&doc)?;
                    println!("{}", pretty);
                }
                Err(e @ DocumentError::Fatal(_)) => {
                    eprintln!("{}", e);
                    exit(1);
                }
                Err(e) => return Err(e),
            }
        }
    }
    Ok(())
}
