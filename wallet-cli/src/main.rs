#[macro_use]
extern crate tracing;
#[macro_use]
extern crate anyhow;

pub mod backup;
pub mod opts;
pub mod proofs;
pub mod restore;
pub mod show;
pub mod unit;

use std::sync::Arc;

use opts::{Cli, Commands, Parser};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose();

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt().with_line_number(true).init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(verbose.to_log())
            .with_line_number(true)
            .init()
    }

    use cashu_mints::store::impl_redb::{Redb, TABLE_KV};
    use cashu_mints::{LogNotifier, MintRegistry, Offline, RegistryOptions};
    use cashu_mints_sqlite::LitePool;

    let options = RegistryOptions::new().verbose(verbose.isdebug());

    macro_rules! exit_on_err {
        ($res: expr, $what: expr) => {{
            match $res {
                Ok(it) => it,
                Err(e) => {
                    error!("{} failed: {}", $what, e);
                    std::process::exit(1);
                }
            }
        }};
    }

    // no transport: commands work on what the database already holds
    macro_rules! call {
        ($opts: expr) => {{
            let dburl = $opts.database.as_str();

            if dburl.ends_with(".redb") || dburl.ends_with(".red") {
                let db = exit_on_err!(Redb::open(dburl, TABLE_KV), "open redb");
                let r = MintRegistry::load(db, Offline, options).await;
                let r = exit_on_err!(r, "load registry");
                $opts.run(r.with_notifier(Arc::new(LogNotifier))).await
            } else if dburl.ends_with(".sqlite")
                || dburl.ends_with(".sqlite3")
                || dburl.ends_with(".db")
            {
                let db = exit_on_err!(LitePool::open(dburl).await, "open sqlite");
                let r = MintRegistry::load(db, Offline, options).await;
                let r = exit_on_err!(r, "load registry");
                $opts.run(r.with_notifier(Arc::new(LogNotifier))).await
            } else {
                error!("unsupport database path/url: {}", dburl);
                std::process::exit(1);
            }
        }};
    }

    match cli.command {
        Commands::Show(c) => {
            call!(c)
        }
        Commands::Unit(c) => {
            call!(c)
        }
        Commands::Proofs(c) => {
            call!(c)
        }
        Commands::Backup(c) => {
            call!(c)
        }
        Commands::Restore(c) => {
            call!(c)
        }
    }
}
