//! DDC/CI frames tunneled through USB HID reports.

use std::{collections::HashMap, ffi::CString, time::Duration};

use anyhow::Context;
use hidapi::{HidApi, HidDevice};
use log::debug;
use parking_lot::Mutex;

use super::{DdcTransport, TransportAddress, TransportConnector, TransportError, TransportKind};

/// HID report id used for both directions
const REPORT_ID: u8 = 0;
/// largest report the monitor control interface sends
const REPORT_SIZE: usize = 64;
const POLL_INTERVAL: Duration = Duration::from_millis(10);
const RECEIVE_TIMEOUT: Duration = Duration::from_millis(500);

pub struct UsbTransport {
    device: HidDevice,
    bus: u16,
    device_number: u16,
}

impl UsbTransport {
    pub fn new(device: HidDevice, bus: u16, device_number: u16) -> Self {
        Self {
            device,
            bus,
            device_number,
        }
    }
}

impl DdcTransport for UsbTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Usb
    }

    fn transmit(&mut self, _addr: u8, data: &[u8]) -> Result<(), TransportError> {
        let mut report = Vec::with_capacity(data.len() + 1);
        report.push(REPORT_ID);
        report.extend_from_slice(data);
        self.device
            .write(&report)
            .with_context(|| format!("HID write to usb {}:{}", self.bus, self.device_number))?;
        Ok(())
    }

    /// polls for an input report until one arrives or the receive timeout passes
    fn receive(&mut self, _addr: u8, max_len: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = [0u8; REPORT_SIZE];
        let mut waited = Duration::ZERO;
        while waited < RECEIVE_TIMEOUT {
            let size = self
                .device
                .read_timeout(&mut buf, POLL_INTERVAL.as_millis() as i32)
                .with_context(|| {
                    format!("HID read from usb {}:{}", self.bus, self.device_number)
                })?;
            if size > 0 {
                return Ok(buf[..size.min(max_len)].to_vec());
            }
            waited += POLL_INTERVAL;
        }
        Err(TransportError::Errno(libc::ETIMEDOUT))
    }

    fn delay(&self, _delay_ms: u64) {}
}

/// Opens HID devices by the paths display enumeration found for each
/// USB bus/device pair.
pub struct UsbConnector {
    api: Mutex<HidApi>,
    paths: HashMap<(u16, u16), CString>,
}

impl UsbConnector {
    pub fn new(paths: HashMap<(u16, u16), CString>) -> Result<Self, TransportError> {
        let api = HidApi::new().context("initializing hidapi")?;
        Ok(Self {
            api: Mutex::new(api),
            paths,
        })
    }
}

impl TransportConnector for UsbConnector {
    fn connect(&self, address: &TransportAddress) -> Result<Box<dyn DdcTransport>, TransportError> {
        let TransportAddress::Usb { bus, device } = address else {
            return Err(TransportError::Unimplemented("non USB addresses"));
        };
        let path = self
            .paths
            .get(&(*bus, *device))
            .ok_or(TransportError::Errno(libc::ENODEV))?;
        let hid = self
            .api
            .lock()
            .open_path(path)
            .with_context(|| format!("opening HID device {path:?}"))?;
        debug!("opened usb {bus}:{device} at {path:?}");
        Ok(Box::new(UsbTransport::new(hid, *bus, *device)))
    }
}
