//! MaskVault - CLI
//!
//! Command-line interface for key management and encryption.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;

use mask_vault::crypto::asymmetric::public_key_fingerprint;
use mask_vault::file_codec::{self, decrypted_file_name, SYMMETRIC_KEY_FILE};
use mask_vault::{
    parse_key_notes, EncryptedDataRecord, EncryptedPayload, HybridService, KeyDirectoryResolver,
    KeySize, KeyStore, RecordKind, StoredKeyPair, SymmetricKey, VaultConfig, VaultError,
};

#[derive(Parser)]
#[command(name = "mask-vault")]
#[command(version = mask_vault::VERSION)]
#[command(about = "MaskVault - RSA key management and hybrid file encryption")]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Key directory, overrides the Documents location
    #[arg(long, global = true)]
    key_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new RSA key pair, replacing the stored one
    Generate {
        /// Key size in bits (2048, 3072 or 4096)
        #[arg(short, long)]
        bits: Option<usize>,

        /// Passphrase for the private key (prompted when omitted)
        #[arg(short, long)]
        passphrase: Option<String>,

        /// Store the private key unencrypted without asking
        #[arg(long, conflicts_with = "passphrase")]
        no_passphrase: bool,
    },

    /// Import a key pair from PEM files (pasted text is cleaned up)
    Import {
        /// Private key file
        private_key: PathBuf,

        /// Public key file
        public_key: PathBuf,

        /// Passphrase of an encrypted private key
        #[arg(short, long)]
        passphrase: Option<String>,
    },

    /// Import a key pair from a notes file ("public key is ... private key ...")
    ImportNotes {
        /// Notes file
        notes: PathBuf,

        /// Passphrase, if the notes do not contain one
        #[arg(short, long)]
        passphrase: Option<String>,
    },

    /// Show the stored key pair
    Show {
        /// Also print the private key PEM
        #[arg(long)]
        private: bool,
    },

    /// Show key directory resolution
    Dir,

    /// Encrypt a text (RSA-OAEP, or a fresh symmetric key with --symmetric)
    EncryptText {
        /// Text to encrypt (read from stdin when omitted)
        text: Option<String>,

        /// Use a fresh symmetric key instead of the RSA public key
        #[arg(long)]
        symmetric: bool,

        /// Write the symmetric key to this file instead of printing it
        #[arg(long, requires = "symmetric")]
        key_out: Option<PathBuf>,

        /// Record file (defaults to the configured records file)
        #[arg(short, long)]
        record: Option<PathBuf>,

        /// Do not write a record file
        #[arg(long, conflicts_with = "record")]
        no_record: bool,
    },

    /// Decrypt a text from base64 or from a record file
    DecryptText {
        /// Base64 ciphertext
        #[arg(required_unless_present = "record")]
        ciphertext: Option<String>,

        /// Record file to read instead
        #[arg(short, long, conflicts_with = "ciphertext")]
        record: Option<PathBuf>,

        /// Symmetric key (base64) for symmetric ciphertexts
        #[arg(short, long)]
        key: Option<String>,

        /// File holding the symmetric key
        #[arg(long, conflicts_with = "key")]
        key_file: Option<PathBuf>,

        /// Passphrase of the private key (prompted when needed)
        #[arg(short, long)]
        passphrase: Option<String>,
    },

    /// Encrypt a file under a fresh symmetric key, or with RSA-OAEP (--rsa)
    EncryptFile {
        /// File to encrypt
        path: PathBuf,

        /// Seal a small file with the RSA public key instead
        #[arg(long)]
        rsa: bool,

        /// Directory for the encrypted file (defaults to the source directory)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Write the symmetric key to this file instead of printing it
        #[arg(long, conflicts_with = "rsa")]
        key_out: Option<PathBuf>,

        /// Also write a JSON record next to the encrypted file
        #[arg(long)]
        record: bool,
    },

    /// Decrypt a file produced by encrypt-file
    DecryptFile {
        /// Encrypted file, or a JSON record with --from-record
        path: PathBuf,

        /// Treat PATH as a JSON record
        #[arg(long)]
        from_record: bool,

        /// Open with the RSA private key (files from encrypt-file --rsa)
        #[arg(long, conflicts_with_all = ["key", "key_file"])]
        rsa: bool,

        /// Symmetric key (base64)
        #[arg(short, long)]
        key: Option<String>,

        /// File holding the symmetric key
        #[arg(long, conflicts_with = "key")]
        key_file: Option<PathBuf>,

        /// Passphrase of the private key, with --rsa
        #[arg(short, long, requires = "rsa")]
        passphrase: Option<String>,

        /// Output path (file, or directory with --from-record)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        if let Some(vault_err) = e.downcast_ref::<VaultError>() {
            if vault_err.requires_new_input() {
                eprintln!("   Check the key, passphrase or input and try again.");
            }
        }
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn load_config(cli: &Cli) -> Result<VaultConfig> {
    let mut config = VaultConfig::load_or_default(cli.config.as_deref())?;
    if let Some(dir) = &cli.key_dir {
        config.key_dir = Some(dir.clone());
    }
    Ok(config)
}

fn open_store(config: VaultConfig) -> Result<KeyStore> {
    let store = KeyStore::open(config)?;
    if store.directory().used_fallback {
        eprintln!(
            "{} Using fallback key directory {}",
            style("⚠").yellow(),
            store.directory().path().display()
        );
    }
    Ok(store)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Generate {
            bits,
            passphrase,
            no_passphrase,
        } => {
            let size = match bits {
                Some(bits) => KeySize::from_bits(bits)?,
                None => config.default_key_size,
            };
            let passphrase = match (passphrase, no_passphrase) {
                (Some(p), _) => Some(SecretString::from(p)),
                (None, true) => None,
                (None, false) => prompt_new_passphrase()?,
            };

            let store = open_store(config)?;
            let stored = generate_with_spinner(&store, size, passphrase)?;
            print_stored(&stored);
        }

        Commands::Import {
            private_key,
            public_key,
            passphrase,
        } => {
            let private_text = read_text(&private_key)?;
            let public_text = read_text(&public_key)?;

            let store = open_store(config)?;
            let stored = import_with_prompt(
                &store,
                &private_text,
                &public_text,
                passphrase.map(SecretString::from),
            )?;
            println!("{} Key pair imported", style("✅").green());
            print_stored(&stored);
        }

        Commands::ImportNotes { notes, passphrase } => {
            let content = read_text(&notes)?;
            let parsed = parse_key_notes(&content)?;
            let passphrase = passphrase.map(SecretString::from).or(parsed.passphrase);

            let store = open_store(config)?;
            let stored =
                import_with_prompt(&store, &parsed.private_key, &parsed.public_key, passphrase)?;
            println!("{} Key pair imported from {}", style("✅").green(), notes.display());
            print_stored(&stored);
        }

        Commands::Show { private } => {
            let store = open_store(config)?;
            let pair = store.inspect()?;

            println!("🔑 {}", style("Stored key pair").bold());
            println!("{:-<60}", "");
            println!("Directory:    {}", store.directory().path().display());
            println!("Key size:     {} bits", pair.key_size);
            println!(
                "Protection:   {}",
                if pair.passphrase_protected { "passphrase" } else { "none" }
            );
            println!("Fingerprint:  SHA256:{}", pair.fingerprint()?);
            println!();
            print!("{}", pair.public_pem);
            if private {
                println!();
                print!("{}", pair.private_pem.as_str());
            }
        }

        Commands::Dir => {
            let resolver = KeyDirectoryResolver::from_config(&config)?;
            println!("Primary:   {}", resolver.primary().display());
            println!("Fallback:  {}", resolver.fallback().display());

            let dir = resolver.resolve()?;
            println!(
                "In use:    {} {}",
                dir.path().display(),
                if dir.used_fallback { style("(fallback)").yellow() } else { style("(primary)").green() }
            );
        }

        Commands::EncryptText {
            text,
            symmetric,
            key_out,
            record,
            no_record,
        } => {
            let text = match text {
                Some(t) => t,
                None => read_stdin()?,
            };
            let service = HybridService::from_config(&config);
            let record_path = (!no_record)
                .then(|| record.unwrap_or_else(|| PathBuf::from(&config.records_file)));

            let data_record = if symmetric {
                let key = SymmetricKey::generate();
                let frame = service.encrypt_bytes(text.as_bytes(), &key)?;
                let data_record = EncryptedDataRecord::symmetric_text(&frame, service.cipher());

                println!("{} Encrypted with {}", style("🔒").cyan(), service.cipher().name());
                println!("{}", data_record.ciphertext);
                emit_key(&key, key_out.as_deref())?;
                data_record
            } else {
                let store = open_store(config)?;
                let public = store.load_public()?;
                let payload = service.encrypt_text(&text, &public)?;

                println!("{} Encrypted with RSA-OAEP", style("🔒").cyan());
                println!("{}", payload.to_base64());
                payload.to_record()
            };

            if let Some(path) = record_path {
                data_record.save(&path)?;
                println!("💾 Record saved to {}", path.display());
            }
        }

        Commands::DecryptText {
            ciphertext,
            record,
            key,
            key_file,
            passphrase,
        } => {
            let service = HybridService::from_config(&config);
            let symmetric_key = read_key_arg(key, key_file.as_deref())?;

            let (kind, bytes) = match (record, ciphertext) {
                (Some(path), _) => {
                    let record = EncryptedDataRecord::load(&path)?;
                    (record.kind, record.ciphertext_bytes()?)
                }
                (None, Some(text)) => {
                    let kind = if symmetric_key.is_some() {
                        RecordKind::SymmetricText
                    } else {
                        RecordKind::RsaText
                    };
                    (kind, EncryptedPayload::from_base64(&text)?.as_bytes().to_vec())
                }
                (None, None) => bail!("pass a ciphertext or --record"),
            };

            let plaintext = match kind {
                RecordKind::RsaText => {
                    let store = open_store(config)?;
                    let (pair, passphrase) =
                        load_with_prompt(&store, passphrase.map(SecretString::from))?;
                    service.decrypt_text(
                        &EncryptedPayload::from_bytes(bytes),
                        &pair,
                        passphrase.as_ref(),
                    )?
                }
                RecordKind::SymmetricText => {
                    let key = match symmetric_key {
                        Some(key) => key,
                        None => prompt_symmetric_key()?,
                    };
                    let plain = service.decrypt_bytes(&bytes, &key)?;
                    String::from_utf8(plain)
                        .map_err(|_| VaultError::DecryptionFailed("plaintext is not UTF-8".into()))?
                }
                RecordKind::File => bail!("this record holds a file, use decrypt-file --from-record"),
                RecordKind::RsaFile => {
                    bail!("this record holds a file, use decrypt-file --rsa --from-record")
                }
            };

            println!("{} Decrypted:", style("🔓").green());
            println!("{}", plaintext);
        }

        Commands::EncryptFile {
            path,
            rsa,
            out_dir,
            key_out,
            record,
        } => {
            let service = HybridService::from_config(&config);
            let out_dir = match out_dir {
                Some(dir) => dir,
                None => source_dir(&path),
            };
            let record_path = record.then(|| out_dir.join(&config.records_file));
            println!("📥 Encrypting {}", path.display());

            if rsa {
                let store = open_store(config)?;
                let encrypted = service.encrypt_small_file(&path, &store.load_public()?)?;
                let written = encrypted.write_to(&out_dir)?;
                println!("{} Encrypted file (RSA-OAEP): {}", style("✅").green(), written.display());

                if let Some(record_path) = record_path {
                    encrypted.to_record().save(&record_path)?;
                    println!("💾 Record saved to {}", record_path.display());
                }
            } else {
                let encrypted = service.encrypt_file(&path)?;
                let written = encrypted.write_to(&out_dir)?;
                println!("{} Encrypted file: {}", style("✅").green(), written.display());

                if let Some(record_path) = record_path {
                    encrypted.to_record().save(&record_path)?;
                    println!("💾 Record saved to {}", record_path.display());
                }

                emit_key(&encrypted.symmetric_key, key_out.as_deref())?;
            }
        }

        Commands::DecryptFile {
            path,
            from_record,
            rsa: true,
            passphrase,
            output,
            ..
        } => {
            let service = HybridService::from_config(&config);
            let store = open_store(config)?;
            let (pair, passphrase) = load_with_prompt(&store, passphrase.map(SecretString::from))?;

            let restored = if from_record {
                let record = EncryptedDataRecord::load(&path)?;
                let out_dir = output.unwrap_or_else(|| source_dir(&path));
                service.decrypt_small_record(&record, &pair, passphrase.as_ref(), &out_dir)?
            } else {
                let output = match output {
                    Some(output) => output,
                    None => default_output_path(&path)?,
                };
                let ciphertext = std::fs::read(&path)
                    .with_context(|| format!("cannot read {}", path.display()))?;
                service.decrypt_small_file(&ciphertext, &pair, passphrase.as_ref(), &output)?
            };

            println!("{} Decrypted file: {}", style("✅").green(), restored.display());
        }

        Commands::DecryptFile {
            path,
            from_record,
            key,
            key_file,
            output,
            ..
        } => {
            let service = HybridService::from_config(&config);
            let key = match read_key_arg(key, key_file.as_deref())? {
                Some(key) => key,
                None => prompt_symmetric_key()?,
            };

            let restored = if from_record {
                let record = EncryptedDataRecord::load(&path)?;
                let out_dir = output.unwrap_or_else(|| source_dir(&path));
                service.decrypt_record(&record, &key, &out_dir)?
            } else {
                let output = match output {
                    Some(output) => output,
                    None => default_output_path(&path)?,
                };
                let ciphertext = std::fs::read(&path)
                    .with_context(|| format!("cannot read {}", path.display()))?;
                service.decrypt_file(&ciphertext, &key, &output)?
            };

            println!("{} Decrypted file: {}", style("✅").green(), restored.display());
        }
    }

    Ok(())
}

// ── Key generation ───────────────────────────────────────────────────────────

fn generate_with_spinner(
    store: &KeyStore,
    size: KeySize,
    passphrase: Option<SecretString>,
) -> Result<StoredKeyPair> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message(format!("Generating {}-bit RSA key pair...", size));
    spinner.enable_steady_tick(Duration::from_millis(80));

    let (tx, rx) = crossbeam_channel::bounded(1);
    let worker_store = store.clone();
    std::thread::spawn(move || {
        let _ = tx.send(worker_store.generate(size, passphrase.as_ref()));
    });

    let result = rx
        .recv()
        .map_err(|_| anyhow!("key generation worker stopped unexpectedly"));
    spinner.finish_and_clear();

    Ok(result??)
}

fn print_stored(stored: &StoredKeyPair) {
    println!("{} {}-bit key pair saved", style("✅").green(), stored.pair.key_size);
    println!("   Private key: {}", stored.private_key_path.display());
    println!("   Public key:  {}", stored.public_key_path.display());
    if !stored.pair.passphrase_protected {
        println!(
            "   {} private key is not passphrase protected",
            style("⚠").yellow()
        );
    }
    if let Ok(public) = stored.pair.public_key() {
        if let Ok(fp) = public_key_fingerprint(&public) {
            println!("   Fingerprint: SHA256:{}", fp);
        }
    }
}

// ── Passphrases and keys ─────────────────────────────────────────────────────

fn prompt_secret(prompt: &str) -> Result<SecretString> {
    let value = rpassword::prompt_password(prompt).context("cannot read from terminal")?;
    Ok(SecretString::from(value))
}

/// Ask twice; an empty answer means no passphrase
fn prompt_new_passphrase() -> Result<Option<SecretString>> {
    use secrecy::ExposeSecret;

    let first = prompt_secret("Passphrase for the private key (empty for none): ")?;
    if first.expose_secret().is_empty() {
        return Ok(None);
    }
    let second = prompt_secret("Repeat passphrase: ")?;
    if first.expose_secret() != second.expose_secret() {
        bail!("passphrases do not match");
    }
    Ok(Some(first))
}

fn import_with_prompt(
    store: &KeyStore,
    private_text: &str,
    public_text: &str,
    passphrase: Option<SecretString>,
) -> Result<StoredKeyPair> {
    match store.import(private_text, public_text, passphrase.as_ref()) {
        Err(VaultError::WrongPassphrase) if passphrase.is_none() => {
            let passphrase = prompt_secret("Private key passphrase: ")?;
            Ok(store.import(private_text, public_text, Some(&passphrase))?)
        }
        other => Ok(other?),
    }
}

fn load_with_prompt(
    store: &KeyStore,
    passphrase: Option<SecretString>,
) -> Result<(mask_vault::KeyPair, Option<SecretString>)> {
    let passphrase = match passphrase {
        Some(p) => Some(p),
        None if store.inspect()?.passphrase_protected => {
            Some(prompt_secret("Private key passphrase: ")?)
        }
        None => None,
    };
    let pair = store.load(passphrase.as_ref())?;
    Ok((pair, passphrase))
}

fn read_key_arg(key: Option<String>, key_file: Option<&Path>) -> Result<Option<SymmetricKey>> {
    match (key, key_file) {
        (Some(text), _) => Ok(Some(SymmetricKey::from_base64(&text)?)),
        (None, Some(path)) => Ok(Some(
            file_codec::read_symmetric_key(path)
                .with_context(|| format!("cannot read key file {}", path.display()))?,
        )),
        (None, None) => Ok(None),
    }
}

fn prompt_symmetric_key() -> Result<SymmetricKey> {
    use secrecy::ExposeSecret;

    let text = prompt_secret("File encryption key: ")?;
    Ok(SymmetricKey::from_base64(text.expose_secret())?)
}

fn emit_key(key: &SymmetricKey, key_out: Option<&Path>) -> Result<()> {
    match key_out {
        Some(path) => {
            let path = if path.is_dir() { path.join(SYMMETRIC_KEY_FILE) } else { path.to_path_buf() };
            file_codec::write_symmetric_key(&path, key)?;
            println!("🔑 Key written to {}", path.display());
        }
        None => {
            println!("🔑 Key (store it separately, it is not saved anywhere):");
            println!("{}", key.to_base64());
        }
    }
    Ok(())
}

// ── Files ────────────────────────────────────────────────────────────────────

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

fn read_stdin() -> Result<String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("cannot read stdin")?;
    Ok(text.trim_end_matches(['\r', '\n']).to_string())
}

fn source_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_output_path(encrypted: &Path) -> Result<PathBuf> {
    let name = encrypted
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("{} has no file name", encrypted.display()))?;
    let original = decrypted_file_name(name).ok_or_else(|| {
        anyhow!(
            "{} does not carry the <encrypted> marker, pass --output",
            encrypted.display()
        )
    })?;
    Ok(source_dir(encrypted).join(original))
}
