//! FSE CLI Client
//!
//! Command-line interface for interacting with an FSE server.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use fse::network::Client;
use fse::{FileInfo, FseError};

/// FSE CLI
#[derive(Parser, Debug)]
#[command(name = "fse-cli")]
#[command(about = "CLI for the FSE file storage server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:9330")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload a local file
    Put {
        /// Name to store the file under
        name: String,

        /// Local file to upload
        path: PathBuf,

        /// Content type recorded with the file
        #[arg(short = 't', long, default_value = "")]
        content_type: String,
    },

    /// Download a file
    Get {
        /// The file name
        name: String,

        /// Write to this path instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show a file's metadata
    Stat {
        /// The file name
        name: String,
    },

    /// List stored files
    List,

    /// Ping the server
    Ping,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> fse::Result<()> {
    let mut client = Client::connect(&args.server)?;

    match args.command {
        Commands::Put {
            name,
            path,
            content_type,
        } => {
            let file = fs::File::open(&path)?;
            let len = file.metadata()?.len();
            let size = u32::try_from(len).map_err(|_| {
                FseError::InvalidOperation(format!(
                    "{} is larger than {} bytes",
                    path.display(),
                    u32::MAX
                ))
            })?;
            let info = client.put_from(&name, &content_type, size, file)?;
            print_info(&info);
        }
        Commands::Get { name, output } => {
            let found = match output {
                Some(path) => {
                    let mut out = io::BufWriter::new(fs::File::create(&path)?);
                    let found = client.get_to(&name, &mut out)?;
                    out.flush()?;
                    if found.is_none() {
                        fs::remove_file(&path)?;
                    }
                    found
                }
                None => {
                    let stdout = io::stdout();
                    let mut out = stdout.lock();
                    let found = client.get_to(&name, &mut out)?;
                    out.flush()?;
                    found
                }
            };
            if found.is_none() {
                return Err(FseError::FileNotFound(name));
            }
        }
        Commands::Stat { name } => match client.stat(&name)? {
            Some(info) => print_info(&info),
            None => return Err(FseError::FileNotFound(name)),
        },
        Commands::List => {
            for info in client.list()? {
                println!("{}\t{}\t{}", info.name, info.size, info.content_type);
            }
        }
        Commands::Ping => {
            client.ping()?;
            println!("PONG");
        }
    }

    Ok(())
}

fn print_info(info: &FileInfo) {
    println!("name:         {}", info.name);
    println!("size:         {}", info.size);
    println!("content type: {}", info.content_type);
    println!("created at:   {}", info.created_at);
    println!("partitions:   {}", info.partition_count);
}
