//! Print a fresh hex-encoded 32-byte key suitable for `SECRET_KEY`.

fn main() {
    println!("{}", proxy_config_service::services::cipher::generate_key_hex());
}
