use std::time::Duration;

use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

// Vision requests on large screenshots regularly take tens of seconds.
const REQUEST_TIMEOUT_SECS: u64 = 120;

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client, reqwest::Error> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
    })
}
