//! Firmware download-and-flash adapter.
//!
//! Streams the image over HTTP(S) straight into the inactive OTA partition
//! with `esp-ota`; nothing is buffered beyond one chunk.  The running
//! version is sent in `x-esp32-version` so the server may answer
//! `304 Not Modified` when there is nothing newer.

use log::{info, warn};

use crate::app::ports::{FirmwarePort, FirmwareRequest, FlashOutcome};

#[cfg(target_os = "espidf")]
use esp_idf_svc::http::{
    Method,
    client::{Configuration as HttpConfiguration, EspHttpConnection},
};

/// Bytes moved from the socket to flash per step.
#[cfg(target_os = "espidf")]
const CHUNK_BYTES: usize = 1024;

#[cfg(target_os = "espidf")]
const HTTP_TIMEOUT: core::time::Duration = core::time::Duration::from_secs(30);

/// Log a failed step and name it.
#[cfg(target_os = "espidf")]
fn step<E: core::fmt::Debug>(name: &'static str) -> impl FnOnce(E) -> &'static str {
    move |e| {
        warn!("OTA: {} failed: {:?}", name, e);
        name
    }
}

pub struct HttpFirmwareAdapter {
    #[cfg(not(target_os = "espidf"))]
    sim_outcome: FlashOutcome,
    #[cfg(not(target_os = "espidf"))]
    sim_requests: Vec<FirmwareRequest>,
}

impl Default for HttpFirmwareAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFirmwareAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            sim_outcome: FlashOutcome::NoUpdate,
            #[cfg(not(target_os = "espidf"))]
            sim_requests: Vec::new(),
        }
    }

    /// Outcome the simulated flash reports.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_outcome(&mut self, outcome: FlashOutcome) {
        self.sim_outcome = outcome;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_requests(&self) -> &[FirmwareRequest] {
        &self.sim_requests
    }

    #[cfg(target_os = "espidf")]
    fn flash(&mut self, request: &FirmwareRequest) -> Result<FlashOutcome, &'static str> {
        let conf = HttpConfiguration {
            timeout: Some(HTTP_TIMEOUT),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let mut conn = EspHttpConnection::new(&conf).map_err(step("http init"))?;
        let headers = [("x-esp32-version", env!("CARGO_PKG_VERSION"))];
        conn.initiate_request(Method::Get, &request.url, &headers)
            .map_err(step("request"))?;
        conn.initiate_response().map_err(step("response"))?;

        let status = conn.status();
        if status == 304 {
            info!("OTA: server reports no newer image");
            return Ok(FlashOutcome::NoUpdate);
        }
        if !(200..300).contains(&status) {
            warn!("OTA: download failed with HTTP {}", status);
            return Ok(FlashOutcome::Failed);
        }

        let mut update = esp_ota::OtaUpdate::begin().map_err(step("partition open"))?;
        let mut chunk = [0u8; CHUNK_BYTES];
        let mut written = 0usize;
        loop {
            let n = conn.read(&mut chunk).map_err(step("read"))?;
            if n == 0 {
                break;
            }
            update.write(&chunk[..n]).map_err(step("flash write"))?;
            written += n;
        }
        if written == 0 {
            warn!("OTA: empty image body");
            return Ok(FlashOutcome::Failed);
        }

        let mut completed = update.finalize().map_err(step("image verify"))?;
        completed
            .set_as_boot_partition()
            .map_err(step("set boot partition"))?;
        info!("OTA: {} bytes written, new image bootable", written);
        Ok(FlashOutcome::Success)
    }
}

impl FirmwarePort for HttpFirmwareAdapter {
    #[cfg(target_os = "espidf")]
    fn download_and_flash(&mut self, request: &FirmwareRequest) -> FlashOutcome {
        info!("OTA: fetching {}", request.url);
        // A dropped `OtaUpdate` aborts the session, so early returns are safe.
        self.flash(request).unwrap_or(FlashOutcome::Failed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn download_and_flash(&mut self, request: &FirmwareRequest) -> FlashOutcome {
        info!("OTA(sim): fetching {} -> {:?}", request.url, self.sim_outcome);
        self.sim_requests.push(request.clone());
        if request.url.is_empty() {
            warn!("OTA(sim): empty URL");
            return FlashOutcome::Failed;
        }
        self.sim_outcome
    }
}

/// Confirm the running image so the bootloader does not roll back.
#[cfg(target_os = "espidf")]
pub fn mark_running_image_valid() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: running image marked valid"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn mark_running_image_valid() {
    info!("OTA(sim): image validation skipped");
}
