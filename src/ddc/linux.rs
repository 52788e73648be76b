use i2cdev::{
    core::I2CDevice,
    linux::{LinuxI2CDevice, LinuxI2CError},
};
use log::{debug, trace};

use super::{
    ci::DDC_CI_ADDR,
    edid::{parse_edid, EDID_LENGTH},
    DdcTransport, TransportAddress, TransportConnector, TransportError, TransportKind,
};

/// E-DDC segment pointer
const EDDC_SEGMENT_POINTER_ADDR: u8 = 0x30;
const EDID_ADDRESS: u8 = 0x50;

const RECEIVE_EDID_RETRIES: u8 = 3;

impl From<LinuxI2CError> for TransportError {
    fn from(err: LinuxI2CError) -> Self {
        std::io::Error::from(err).into()
    }
}

/// DDC/CI over a `/dev/i2c-N` device node.
pub struct I2cTransport {
    bus: u32,
    device: LinuxI2CDevice,
    slave_addr: u8,
}

impl I2cTransport {
    /// open the bus device node with the DDC/CI slave address selected
    pub fn open(bus: u32) -> Result<Self, TransportError> {
        let device = LinuxI2CDevice::new(format!("/dev/i2c-{bus}"), DDC_CI_ADDR.into())?;
        debug!("opened /dev/i2c-{bus}");
        Ok(Self {
            bus,
            device,
            slave_addr: DDC_CI_ADDR,
        })
    }

    pub fn bus(&self) -> u32 {
        self.bus
    }

    pub fn set_slave_address(&mut self, addr: u8) -> Result<(), TransportError> {
        if self.slave_addr != addr {
            self.device.set_slave_address(addr.into())?;
            self.slave_addr = addr;
        }
        Ok(())
    }

    fn read_edid_block(&mut self) -> Result<Vec<u8>, TransportError> {
        // reset eddc segment pointer. May fail if display does not implement eddc for specific input
        if self.set_slave_address(EDDC_SEGMENT_POINTER_ADDR).is_ok() {
            let _ = self.device.write(&[0x0]);
        }
        self.set_slave_address(EDID_ADDRESS)?;
        let mut receive_try = RECEIVE_EDID_RETRIES;
        loop {
            self.device.write(&[0x0])?;
            let mut data = vec![0; EDID_LENGTH];
            self.device.read(&mut data)?;
            if receive_try == 0 || parse_edid(&data).is_ok() {
                return Ok(data);
            }
            trace!("EDID on /dev/i2c-{} failed to parse, retrying", self.bus);
            receive_try -= 1;
        }
    }
}

impl DdcTransport for I2cTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::I2c
    }

    fn transmit(&mut self, addr: u8, data: &[u8]) -> Result<(), TransportError> {
        self.set_slave_address(addr)?;
        self.device.write(data)?;
        Ok(())
    }

    fn receive(&mut self, addr: u8, max_len: usize) -> Result<Vec<u8>, TransportError> {
        self.set_slave_address(addr)?;
        let mut data = vec![0; max_len];
        self.device.read(&mut data)?;
        Ok(data)
    }

    /// this function only reads the first 128 of edid, this
    /// can be reasonably assumed to be present on all display devices
    fn read_edid(&mut self) -> Result<Vec<u8>, TransportError> {
        let edid = self.read_edid_block();
        // restore the command channel even if the EDID read failed
        let restored = self.set_slave_address(DDC_CI_ADDR);
        let edid = edid?;
        restored?;
        Ok(edid)
    }
}

/// Opens `/dev/i2c-N` for [`TransportAddress::I2c`] addresses.
#[derive(Debug, Default, Clone, Copy)]
pub struct I2cConnector;

impl TransportConnector for I2cConnector {
    fn connect(&self, address: &TransportAddress) -> Result<Box<dyn DdcTransport>, TransportError> {
        match address {
            TransportAddress::I2c { bus } => Ok(Box::new(I2cTransport::open(*bus)?)),
            _ => Err(TransportError::Unimplemented("non I2C addresses")),
        }
    }
}
