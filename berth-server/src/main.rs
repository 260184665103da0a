//! Berth transfer daemon

mod args;

use std::fs;
use std::io::{self, BufReader};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use sha2::{Digest, Sha256};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::rustls::pki_types::CertificateDer;

use berth_server::commands::{self, CommandContext};
use berth_server::constants::*;
use berth_server::db::{self, Database};
use berth_server::engine::SimEngine;
use berth_server::hub::EventHub;
use berth_server::reconcile::Reconciler;
use berth_server::store::TransferStore;
use berth_server::websocket::{self, WsParams};

use args::Args;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Print banner first
    println!("{}{}", MSG_BANNER, env!("CARGO_PKG_VERSION"));

    // Setup database
    let (database, db_path) = setup_db(args.database).await;

    // Apply stored-setting overrides from the command line
    if let Some(secs) = args.tick_interval {
        if let Err(e) = database.config.set_tick_interval_secs(secs).await {
            eprintln!("{}{}", ERR_GENERIC, e);
        }
    }
    if let Some(ticks) = args.desync_threshold {
        if let Err(e) = database.config.set_desync_threshold(ticks).await {
            eprintln!("{}{}", ERR_GENERIC, e);
        }
    }

    // Resolve subscriber api key (CLI > stored > freshly generated)
    let api_key = Arc::new(setup_api_key(&database, args.api_key).await);

    // Setup download root
    let download_root = setup_download_root(args.download_root, &database).await;
    println!("{}{}", MSG_DOWNLOAD_ROOT, download_root.display());

    // Setup network (TCP listener + TLS)
    let (listener, tls_acceptor) = setup_network(args.bind, args.port, &db_path).await;

    // Core components: store, hub, engine, reconciler
    let store = Arc::new(TransferStore::new());
    let hub = Arc::new(EventHub::new());
    let engine = Arc::new(SimEngine::new());
    println!("{}", MSG_ENGINE_SIMULATED);

    let ctx = CommandContext {
        store: store.clone(),
        engine: engine.clone(),
        hub: hub.clone(),
        db: database.clone(),
        download_root,
        debug: args.debug,
    };

    // Re-submit persisted transfers to the engine
    let restored = commands::restore_saved_transfers(&ctx).await;
    if restored > 0 {
        println!("{}{}", MSG_RESTORED_TRANSFERS, restored);
    }

    let reconciler = Reconciler::new(
        store.clone(),
        engine.clone(),
        hub.clone(),
        database.clone(),
        args.debug,
    );

    // Setup graceful shutdown handling
    let shutdown_signal = setup_shutdown_signal();

    let debug = args.debug;
    tokio::select! {
        _ = shutdown_signal => {
            println!("{}", MSG_SHUTDOWN_RECEIVED);
        }
        // Reconciliation tick loop
        _ = reconciler.run() => {}
        // Subscriber accept loop
        _ = async {
            loop {
                match listener.accept().await {
                    Ok((socket, peer_addr)) => {
                        let params = WsParams {
                            peer_addr,
                            api_key: api_key.clone(),
                            hub: hub.clone(),
                            store: store.clone(),
                            debug,
                        };
                        let tls_acceptor = tls_acceptor.clone();

                        tokio::spawn(async move {
                            if let Err(e) =
                                websocket::handle_subscriber_connection(socket, tls_acceptor, params)
                                    .await
                            {
                                log_connection_error(&e, peer_addr, debug);
                            }
                        });
                    }
                    Err(e) => {
                        eprintln!("{}{}", ERR_ACCEPT, e);
                    }
                }
            }
        } => {}
    }
}

/// Setup database connection, returning the handle and resolved path
async fn setup_db(database_path: Option<PathBuf>) -> (Database, PathBuf) {
    let db_path = database_path.unwrap_or_else(|| match db::default_database_path() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{}{}", ERR_GENERIC, e);
            std::process::exit(1);
        }
    });

    let pool = match db::init_db(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("{}{}", ERR_DATABASE_INIT, e);
            std::process::exit(1);
        }
    };
    println!("{}{}", MSG_DATABASE, db_path.display());

    // Set secure permissions on database file (0o600) - Unix only
    #[cfg(unix)]
    if let Err(e) = set_secure_permissions(&db_path) {
        eprintln!("{}{}", ERR_SET_PERMISSIONS, e);
        std::process::exit(1);
    }

    (Database::new(pool), db_path)
}

/// Resolve the subscriber api key: CLI override, stored value, or a fresh
/// random one (printed once so an operator can hand it to clients)
async fn setup_api_key(database: &Database, override_key: Option<String>) -> String {
    if let Some(key) = override_key {
        if let Err(e) = database.config.set_api_key(&key).await {
            eprintln!("{}{}", ERR_GENERIC, e);
        }
        return key;
    }

    if let Some(key) = database.config.get_api_key().await {
        return key;
    }

    let key = hex::encode(rand::random::<[u8; 16]>());
    if let Err(e) = database.config.set_api_key(&key).await {
        eprintln!("{}{}", ERR_GENERIC, e);
    }
    println!("{}{}", MSG_API_KEY_GENERATED, key);
    key
}

/// Resolve and create the download root directory
async fn setup_download_root(override_root: Option<PathBuf>, database: &Database) -> PathBuf {
    let root = if let Some(root) = override_root {
        if let Err(e) = database.config.set_download_root(&root.display().to_string()).await {
            eprintln!("{}{}", ERR_GENERIC, e);
        }
        root
    } else if let Some(root) = database.config.get_download_root().await {
        root
    } else {
        dirs::download_dir()
            .map(|d| d.join("berth"))
            .unwrap_or_else(|| PathBuf::from("./downloads"))
    };

    if let Err(e) = fs::create_dir_all(&root) {
        eprintln!("{}{}", ERR_GENERIC, e);
        std::process::exit(1);
    }
    root
}

/// Setup network: TCP listener and TLS acceptor
async fn setup_network(
    bind: std::net::IpAddr,
    port: u16,
    db_path: &Path,
) -> (TcpListener, TlsAcceptor) {
    // Certificates live next to the database
    let cert_dir = db_path.parent().expect(ERR_DB_PATH_NO_PARENT).to_path_buf();

    let tls_acceptor = match load_or_generate_tls_config(&cert_dir) {
        Ok(acceptor) => acceptor,
        Err(e) => {
            eprintln!("{}{}", ERR_TLS_INIT, e);
            std::process::exit(1);
        }
    };
    println!("{}{}", MSG_CERTIFICATES, cert_dir.display());

    let addr = SocketAddr::new(bind, port);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("{}{}: {}", ERR_BIND_FAILED, addr, e);
            std::process::exit(1);
        }
    };
    println!("{}{}", MSG_LISTENING, addr);

    (listener, tls_acceptor)
}

/// Load existing TLS configuration or generate a new self-signed certificate
fn load_or_generate_tls_config(cert_dir: &Path) -> Result<TlsAcceptor, String> {
    let cert_path = cert_dir.join(CERT_FILENAME);
    let key_path = cert_dir.join(KEY_FILENAME);

    if cert_path.exists() && key_path.exists() {
        let acceptor = load_tls_config(&cert_path, &key_path)?;
        display_certificate_fingerprint(&cert_path)?;
        Ok(acceptor)
    } else {
        println!("{}", MSG_GENERATING_CERT);
        generate_self_signed_cert(&cert_path, &key_path)?;
        let acceptor = load_tls_config(&cert_path, &key_path)?;
        display_certificate_fingerprint(&cert_path)?;
        Ok(acceptor)
    }
}

/// Generate a self-signed certificate and private key
fn generate_self_signed_cert(cert_path: &Path, key_path: &Path) -> Result<(), String> {
    use rcgen::{CertificateParams, KeyPair};

    let key_pair = KeyPair::generate().map_err(|e| format!("{}{}", ERR_GENERATE_KEYPAIR, e))?;

    let mut params =
        CertificateParams::new(vec![]).map_err(|e| format!("{}{}", ERR_CREATE_CERT_PARAMS, e))?;
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, TLS_CERT_COMMON_NAME);

    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| format!("{}{}", ERR_GENERATE_CERT, e))?;

    fs::write(cert_path, cert.pem()).map_err(|e| format!("{}{}", ERR_WRITE_CERT_FILE, e))?;
    #[cfg(unix)]
    set_secure_permissions(cert_path).map_err(|e| format!("{}{}", ERR_SET_CERT_PERMISSIONS, e))?;

    fs::write(key_path, key_pair.serialize_pem())
        .map_err(|e| format!("{}{}", ERR_WRITE_KEY_FILE, e))?;
    #[cfg(unix)]
    set_secure_permissions(key_path).map_err(|e| format!("{}{}", ERR_SET_KEY_PERMISSIONS, e))?;

    println!("{}{}", MSG_CERT_GENERATED, cert_path.display());
    println!("{}{}", MSG_KEY_GENERATED, key_path.display());

    Ok(())
}

/// Load TLS configuration from certificate and key files
fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, String> {
    let cert_file =
        fs::File::open(cert_path).map_err(|e| format!("{}{}", ERR_OPEN_CERT_FILE, e))?;
    let mut cert_reader = BufReader::new(cert_file);
    let certs: Vec<CertificateDer> = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("{}{}", ERR_PARSE_CERT, e))?;

    if certs.is_empty() {
        return Err(ERR_NO_CERTS_FOUND.to_string());
    }

    let key_file = fs::File::open(key_path).map_err(|e| format!("{}{}", ERR_OPEN_KEY_FILE, e))?;
    let mut key_reader = BufReader::new(key_file);
    let private_key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| format!("{}{}", ERR_PARSE_KEY, e))?
        .ok_or(ERR_NO_KEY_FOUND)?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, private_key)
        .map_err(|e| format!("{}{}", ERR_CREATE_TLS_CONFIG, e))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Set secure file permissions (0o600 - owner read/write only)
/// Unix only - Windows uses NTFS ACLs by default
#[cfg(unix)]
fn set_secure_permissions(path: &Path) -> Result<(), String> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(|e| format!("{}{}", ERR_READ_METADATA, e))?;
    let mut permissions = metadata.permissions();
    permissions.set_mode(0o600);
    fs::set_permissions(path, permissions).map_err(|e| format!("{}{}", ERR_SET_PERMS, e))?;
    Ok(())
}

/// Calculate and display certificate fingerprint (SHA-256)
fn display_certificate_fingerprint(cert_path: &Path) -> Result<(), String> {
    let cert_pem =
        fs::read_to_string(cert_path).map_err(|e| format!("{}{}", ERR_OPEN_CERT_FILE, e))?;
    let cert_der = pem::parse(&cert_pem).map_err(|e| format!("{}{}", ERR_PARSE_CERT, e))?;

    let mut hasher = Sha256::new();
    hasher.update(cert_der.contents());
    let fingerprint = hasher.finalize();

    let hex_str = hex::encode_upper(fingerprint);
    let fingerprint_str = hex_str
        .as_bytes()
        .chunks(2)
        .map(|chunk| std::str::from_utf8(chunk).expect("hex encoding produces valid ASCII"))
        .collect::<Vec<_>>()
        .join(":");

    println!("{}{}", MSG_CERT_FINGERPRINT, fingerprint_str);
    Ok(())
}

/// Log connection errors, filtering out benign TLS warnings
fn log_connection_error(error: &io::Error, peer_addr: SocketAddr, debug: bool) {
    let error_msg = error.to_string();

    // TLS close_notify warnings are clients disconnecting abruptly
    if error_msg.contains(TLS_CLOSE_NOTIFY_MSG) {
        return;
    }

    // TLS handshake failures are debug-only (scanners, incompatible clients)
    if error_msg.contains(TLS_HANDSHAKE_FAILED_PREFIX) {
        if debug {
            eprintln!("{}{}: {}", ERR_CONNECTION, peer_addr, error);
        }
        return;
    }

    eprintln!("{}{}: {}", ERR_CONNECTION, peer_addr, error);
}

/// Setup graceful shutdown signal handling (Ctrl+C)
async fn setup_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate()).expect(ERR_SIGNAL_SIGTERM);
        let mut sigint = signal(SignalKind::interrupt()).expect(ERR_SIGNAL_SIGINT);

        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect(ERR_SIGNAL_CTRLC);
    }
}
