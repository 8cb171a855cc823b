//! Register access on an I2C bus through `/dev/i2c-N`.
//!
//! Transfers go through the `I2C_RDWR` ioctl, which sends a batch of
//! messages as one combined transaction. Message buffers are borrowed for the
//! duration of the call only.
//!
//! See <https://docs.kernel.org/i2c/dev-interface.html>.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr;

use log::debug;

use crate::error::{Error, Result};

const I2C_FUNCS: libc::c_ulong = 0x0705;
const I2C_RDWR: libc::c_ulong = 0x0707;

/// Most messages the kernel accepts in one `I2C_RDWR` call.
pub const RDWR_IOCTL_MAX_MSGS: usize = 42;

/// Read from the target instead of writing.
pub const MSG_READ: u16 = 0x0001;
pub const MSG_TEN: u16 = 0x0010;
pub const MSG_DMA_SAFE: u16 = 0x0200;
pub const MSG_RECV_LEN: u16 = 0x0400;
pub const MSG_NO_READ_ACK: u16 = 0x0800;
pub const MSG_IGNORE_NAK: u16 = 0x1000;
pub const MSG_REV_DIR_ADDR: u16 = 0x2000;
/// Continue the previous message without a new start condition.
pub const MSG_NO_START: u16 = 0x4000;
pub const MSG_STOP: u16 = 0x8000;

/// `struct i2c_msg`
#[repr(C)]
#[derive(Debug)]
struct RawMsg {
    addr: u16,
    flags: u16,
    len: u16,
    buf: *mut u8,
}

/// `struct i2c_rdwr_ioctl_data`
#[repr(C)]
#[derive(Debug)]
struct RdwrIoctlData {
    msgs: *mut RawMsg,
    nmsgs: u32,
}

/// One message of a combined transfer.
#[derive(Debug)]
pub struct Msg<'a> {
    pub addr: u16,
    pub flags: u16,
    pub buf: &'a mut [u8],
}

impl<'a> Msg<'a> {
    pub fn write(addr: u16, buf: &'a mut [u8]) -> Self {
        Self {
            addr,
            flags: 0,
            buf,
        }
    }

    /// A read continuing the previous message with a repeated start.
    pub fn read(addr: u16, buf: &'a mut [u8]) -> Self {
        Self {
            addr,
            flags: MSG_READ | MSG_NO_START,
            buf,
        }
    }
}

fn to_raw(msgs: &mut [Msg<'_>]) -> Result<Vec<RawMsg>> {
    if msgs.is_empty() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "no I2C messages to transfer",
        )));
    }
    if msgs.len() > RDWR_IOCTL_MAX_MSGS {
        return Err(Error::TooManyMessages {
            count: msgs.len(),
            max: RDWR_IOCTL_MAX_MSGS,
        });
    }

    msgs.iter_mut()
        .map(|msg| {
            let len = u16::try_from(msg.buf.len()).map_err(|_| {
                Error::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("I2C message of {} bytes is too long", msg.buf.len()),
                ))
            })?;
            let buf = if len == 0 {
                ptr::null_mut()
            } else {
                msg.buf.as_mut_ptr()
            };
            Ok(RawMsg {
                addr: msg.addr,
                flags: msg.flags,
                len,
                buf,
            })
        })
        .collect()
}

/// An open I2C character device.
#[derive(Debug)]
pub struct Device {
    file: File,
    path: PathBuf,
    funcs: libc::c_ulong,
}

impl Device {
    /// Open `path` read-write and query the adapter's functionality mask.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| Error::Device {
                path: path.clone(),
                message: e.to_string(),
            })?;

        let mut device = Device {
            file,
            path,
            funcs: 0,
        };

        let mut funcs: libc::c_ulong = 0;
        device.ioctl(I2C_FUNCS, &mut funcs as *mut libc::c_ulong as *mut libc::c_void)?;
        device.funcs = funcs;
        debug!(
            "opened I2C device {} (funcs {:#x})",
            device.path.display(),
            device.funcs
        );
        Ok(device)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `I2C_FUNC_*` bits reported by the adapter.
    pub fn funcs(&self) -> u64 {
        self.funcs as u64
    }

    fn ioctl(&self, request: libc::c_ulong, arg: *mut libc::c_void) -> Result<()> {
        let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), request as _, arg) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            return Err(Error::Device {
                path: self.path.clone(),
                message: err.to_string(),
            });
        }
        Ok(())
    }

    /// Run `msgs` as one combined transfer.
    pub fn rdwr(&self, msgs: &mut [Msg<'_>]) -> Result<()> {
        let mut raw = to_raw(msgs)?;
        let mut request = RdwrIoctlData {
            msgs: raw.as_mut_ptr(),
            nmsgs: raw.len() as u32,
        };

        let result = self.ioctl(
            I2C_RDWR,
            &mut request as *mut RdwrIoctlData as *mut libc::c_void,
        );

        // The buffers are only lent for the call.
        request.msgs = ptr::null_mut();
        for msg in &mut raw {
            msg.buf = ptr::null_mut();
        }

        result
    }

    /// Read one register: write the register number, then read one byte.
    pub fn read_reg(&self, addr: u16, reg: u8) -> Result<u8> {
        let mut out = [reg];
        let mut input = [0u8];
        self.rdwr(&mut [Msg::write(addr, &mut out), Msg::read(addr, &mut input)])?;
        Ok(input[0])
    }

    pub fn write_reg(&self, addr: u16, reg: u8, value: u8) -> Result<()> {
        let mut out = [reg, value];
        self.rdwr(&mut [Msg::write(addr, &mut out)])
    }

    /// Write `write`, then fill `read`, in one transaction.
    ///
    /// An empty `write` sends a single zero byte. An empty `read` sends only
    /// the write message.
    pub fn txn(&self, addr: u16, write: &[u8], read: &mut [u8]) -> Result<()> {
        let mut out = if write.is_empty() {
            vec![0u8]
        } else {
            write.to_vec()
        };

        if read.is_empty() {
            self.rdwr(&mut [Msg::write(addr, &mut out)])
        } else {
            self.rdwr(&mut [Msg::write(addr, &mut out), Msg::read(addr, read)])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_raw_describes_buffers() {
        let mut out = [0x10u8];
        let mut input = [0u8; 4];
        let mut msgs = [Msg::write(0x50, &mut out), Msg::read(0x50, &mut input)];

        let raw = to_raw(&mut msgs).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].addr, 0x50);
        assert_eq!(raw[0].flags, 0);
        assert_eq!(raw[0].len, 1);
        assert_eq!(raw[1].flags, MSG_READ | MSG_NO_START);
        assert_eq!(raw[1].len, 4);
        assert!(!raw[1].buf.is_null());
    }

    #[test]
    fn test_to_raw_empty_buffer_has_null_pointer() {
        let mut empty: [u8; 0] = [];
        let mut msgs = [Msg::write(0x50, &mut empty)];
        let raw = to_raw(&mut msgs).unwrap();
        assert_eq!(raw[0].len, 0);
        assert!(raw[0].buf.is_null());
    }

    #[test]
    fn test_to_raw_message_limit() {
        let mut buffers = vec![[0u8; 1]; RDWR_IOCTL_MAX_MSGS + 1];
        let mut msgs: Vec<Msg<'_>> = buffers
            .iter_mut()
            .map(|buf| Msg::write(0x50, buf))
            .collect();

        match to_raw(&mut msgs) {
            Err(Error::TooManyMessages { count, max }) => {
                assert_eq!(count, 43);
                assert_eq!(max, 42);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        assert_eq!(to_raw(&mut msgs[..RDWR_IOCTL_MAX_MSGS]).unwrap().len(), 42);
        assert!(to_raw(&mut []).is_err());
    }

    #[test]
    fn test_to_raw_rejects_oversized_buffer() {
        let mut big = vec![0u8; usize::from(u16::MAX) + 1];
        let mut msgs = [Msg::write(0x50, &mut big)];
        assert!(matches!(to_raw(&mut msgs), Err(Error::Io(_))));
    }

    #[test]
    fn test_open_missing_device() {
        let err = Device::open("/nonexistent/i2c-99").unwrap_err();
        match err {
            Error::Device { path, .. } => assert_eq!(path, PathBuf::from("/nonexistent/i2c-99")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_open_rejects_non_i2c_device() {
        // /dev/null opens fine but does not understand I2C_FUNCS.
        let err = Device::open("/dev/null").unwrap_err();
        assert!(matches!(err, Error::Device { .. }));
    }
}
