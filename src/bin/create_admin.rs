use std::{
    error::Error,
    io,
    path::Path,
    process::exit,
};

use clap::Parser;
use rusqlite::Connection;

use site_manager::{PasswordHash, ValidatedPassword, create_admin, initialize_db};

/// A utility for creating an administrator account.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The name the administrator logs in with.
    #[arg(long)]
    username: String,

    /// The name shown in the audit log, defaults to the username.
    #[arg(long)]
    display_name: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let db_path = Path::new(&args.db_path);
    validate_db_path(db_path);

    let display_name = args.display_name.as_deref().unwrap_or(&args.username);
    println!("Creating administrator '{}' ({display_name})", args.username);

    let password_hash = match get_new_password_hash(&[&args.username, display_name]) {
        Some(password_hash) => password_hash,
        None => return Ok(()),
    };

    let connection = Connection::open(db_path)?;
    initialize_db(&connection)?;

    match create_admin(&args.username, display_name, password_hash, &connection) {
        Ok(admin) => {
            println!("Administrator created with ID {}.", admin.id);
            Ok(())
        }
        Err(site_manager::Error::DuplicateEntry) => {
            print_error(format!("the username '{}' is already taken.", args.username));
            exit(1);
        }
        Err(error) => Err(error.into()),
    }
}

fn validate_db_path(db_path: &Path) {
    match db_path.extension() {
        Some(extension) if !extension.is_empty() => {}
        _ => {
            print_error("Database path must include a file extension (e.g., 'site.db').");
            exit(1);
        }
    }
}

fn get_new_password_hash(user_inputs: &[&str]) -> Option<PasswordHash> {
    loop {
        println!();

        let first_password = match rpassword::prompt_password("Enter a password: ") {
            Ok(string) => string,
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => {
                return None;
            }
            Err(error) => {
                print_error(format!("Could not read password from stdin: {error}"));
                return None;
            }
        };

        let validated_password = match ValidatedPassword::new(&first_password, user_inputs) {
            Ok(password) => password,
            Err(error) => {
                print_error(error);
                continue;
            }
        };

        let second_password = match rpassword::prompt_password("Enter the same password again: ")
        {
            Ok(string) => string,
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => {
                return None;
            }
            Err(error) => {
                print_error(format!("Could not read password from stdin: {error}"));
                return None;
            }
        };

        if first_password != second_password {
            print_error("Passwords must match, try again.");
            continue;
        }

        match PasswordHash::new(validated_password, PasswordHash::DEFAULT_COST) {
            Ok(password_hash) => return Some(password_hash),
            Err(error) => {
                print_error(format!("Could not hash password: {error}. Try again."));
            }
        }
    }
}

fn print_error(error: impl ToString) {
    eprintln!(
        "\x1b[31;1m{}\x1b[0m",
        capitalise_first_char(&error.to_string())
    )
}

/// From https://crates.io/crates/capitalize
fn capitalise_first_char(string: &str) -> String {
    let mut chars = string.chars();
    let Some(first) = chars.next() else {
        return String::with_capacity(0);
    };
    first.to_uppercase().chain(chars).collect()
}
