//! Outbound command encoding
//!
//! Every command is framed as `LENGTH | ADDRESS | CMD | payload | CRC-16`.
//! Builders validate their arguments before anything is written, so an
//! invalid request never produces a malformed frame.

use heapless::Vec;

use crate::crc::{crc16, CRC_LEN};
use crate::frame::MAX_FRAME_SIZE;
use crate::tag::MAX_EPC_LEN;

// Command codes
pub const CMD_TAG_INVENTORY: u8 = 0x01;
pub const CMD_READ_DATA: u8 = 0x02;
pub const CMD_WRITE_DATA: u8 = 0x03;
pub const CMD_WRITE_EPC: u8 = 0x04;
pub const CMD_KILL_TAG: u8 = 0x05;
pub const CMD_SET_PROTECTION: u8 = 0x06;
pub const CMD_BLOCK_ERASE: u8 = 0x07;
pub const CMD_SINGLE_TAG_INVENTORY: u8 = 0x0F;
pub const CMD_OBTAIN_READER_INFO: u8 = 0x21;
pub const CMD_MODIFY_FREQUENCY: u8 = 0x22;
pub const CMD_MODIFY_READER_ADDR: u8 = 0x24;
pub const CMD_MODIFY_INVENTORY_TIME: u8 = 0x25;
pub const CMD_MODIFY_BAUD_RATE: u8 = 0x28;
pub const CMD_MODIFY_RF_POWER: u8 = 0x2F;
pub const CMD_LED_BUZZER_CONTROL: u8 = 0x33;
pub const CMD_SETUP_ANTENNA_MUX: u8 = 0x3F;
pub const CMD_ENABLE_BUZZER: u8 = 0x40;
pub const CMD_GPIO_CONTROL: u8 = 0x46;
pub const CMD_OBTAIN_GPIO_STATE: u8 = 0x47;
pub const CMD_OBTAIN_READER_SN: u8 = 0x4C;
pub const CMD_START_FAST_INVENTORY: u8 = 0x50;
pub const CMD_STOP_FAST_INVENTORY: u8 = 0x51;
pub const CMD_ENABLE_ANTENNA_CHECK: u8 = 0x66;
pub const CMD_GET_DATA_FROM_BUFFER: u8 = 0x72;
pub const CMD_CLEAR_BUFFER: u8 = 0x73;
pub const CMD_GET_TAG_COUNT: u8 = 0x74;
pub const CMD_SET_WORK_MODE: u8 = 0x7F;
pub const CMD_MEASURE_TEMPERATURE: u8 = 0x92;
pub const CMD_STOP_IMMEDIATELY: u8 = 0x93;
pub const CMD_SELECT: u8 = 0x9A;

/// Response-command code of tags pushed by fast inventory
pub const RECMD_AUTO_UPLOAD: u8 = 0xEE;

/// Highest RF power setting (dBm)
pub const MAX_RF_POWER: u8 = 30;

/// Highest frequency channel index
pub const MAX_CHANNEL: u8 = 62;

/// Scan time of a single-shot inventory round (× 100 ms)
pub const SCAN_TIME_SINGLE: u8 = 0x32;

/// Scan time of each round of a repeating inventory (× 100 ms)
pub const SCAN_TIME_CONTINUOUS: u8 = 0x0A;

/// Largest command payload that still fits a frame
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - 3 - CRC_LEN;

/// Largest inventory mask in bytes (255 bits)
pub const MAX_MASK_BYTES: usize = 32;

/// Memory bank selector for masks
pub const MEMBANK_EPC: u8 = 0x01;

/// Largest word count of a single read or write
pub const MAX_ACCESS_WORDS: u8 = 120;

/// Largest write payload in bytes
pub const MAX_WRITE_BYTES: usize = MAX_ACCESS_WORDS as usize * 2;

/// Access and kill passwords are one 32-bit word, MSB first
pub type Password = [u8; 4];

/// EPC identifying the tag an access command is addressed to
pub type Epc = Vec<u8, MAX_EPC_LEN>;

/// `ENum` value announcing mask addressing in a read request
const ENUM_MASK_MODE: u8 = 0xFF;

/// Session values accepted by the reader (S0-S3, reference default, smart)
const SESSION_REFERENCE: u8 = 0xFE;
const SESSION_SMART: u8 = 0xFF;

/// Errors raised while building command frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// An argument is outside its documented range
    InvalidParameter(&'static str),
    /// Output buffer cannot hold the frame
    BufferTooSmall,
    /// Payload would exceed the maximum frame size
    PayloadTooLarge,
    /// Raw command code has no builder
    UnknownCommand(u8),
}

impl core::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EncodeError::InvalidParameter(what) => write!(f, "invalid parameter: {what}"),
            EncodeError::BufferTooSmall => f.write_str("output buffer too small"),
            EncodeError::PayloadTooLarge => f.write_str("payload exceeds frame size"),
            EncodeError::UnknownCommand(code) => write!(f, "unknown command {code:#04x}"),
        }
    }
}

/// Inventory target flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Target {
    #[default]
    A,
    B,
}

impl Target {
    pub fn as_byte(self) -> u8 {
        match self {
            Target::A => 0x00,
            Target::B => 0x01,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Target::A),
            0x01 => Some(Target::B),
            _ => None,
        }
    }
}

/// Regulatory frequency band
///
/// The 4-bit band code is split over the two frequency bytes: its high pair
/// lives in bits 7-6 of the max-channel byte, its low pair in bits 7-6 of the
/// min-channel byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrequencyBand {
    ChinaBand2,
    Us,
    Korea,
    Eu,
    ChinaBand1,
}

impl FrequencyBand {
    /// 4-bit band code
    pub fn code(self) -> u8 {
        match self {
            FrequencyBand::ChinaBand2 => 0b0001,
            FrequencyBand::Us => 0b0010,
            FrequencyBand::Korea => 0b0011,
            FrequencyBand::Eu => 0b0100,
            FrequencyBand::ChinaBand1 => 0b1000,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0b0001 => Some(FrequencyBand::ChinaBand2),
            0b0010 => Some(FrequencyBand::Us),
            0b0011 => Some(FrequencyBand::Korea),
            0b0100 => Some(FrequencyBand::Eu),
            0b1000 => Some(FrequencyBand::ChinaBand1),
            _ => None,
        }
    }

    /// Recover the band from a (max, min) frequency byte pair
    pub fn from_frequency_bytes(max: u8, min: u8) -> Option<Self> {
        Self::from_code(((max >> 6) << 2) | (min >> 6))
    }

    /// Encode (max, min) channel indices into the two wire bytes
    pub fn frequency_bytes(self, max_channel: u8, min_channel: u8) -> (u8, u8) {
        let code = self.code();
        (
            ((code >> 2) & 0x03) << 6 | (max_channel & 0x3F),
            (code & 0x03) << 6 | (min_channel & 0x3F),
        )
    }
}

/// UART baud rate selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BaudRate {
    B9600,
    B19200,
    B38400,
    B57600,
    B115200,
}

impl BaudRate {
    pub fn index(self) -> u8 {
        match self {
            BaudRate::B9600 => 0,
            BaudRate::B19200 => 1,
            BaudRate::B38400 => 2,
            BaudRate::B57600 => 5,
            BaudRate::B115200 => 6,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(BaudRate::B9600),
            1 => Some(BaudRate::B19200),
            2 => Some(BaudRate::B38400),
            5 => Some(BaudRate::B57600),
            6 => Some(BaudRate::B115200),
            _ => None,
        }
    }
}

/// Inventory mask matching a bit range of a tag memory bank
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InventoryMask {
    pub bank: u8,
    /// Start bit address
    pub bit_address: u16,
    /// Mask length in bits
    pub bit_length: u8,
    /// Mask bytes, `ceil(bit_length / 8)` of them
    pub data: Vec<u8, MAX_MASK_BYTES>,
}

impl InventoryMask {
    fn validate(&self) -> Result<(), EncodeError> {
        if self.data.len() != (self.bit_length as usize).div_ceil(8) {
            return Err(EncodeError::InvalidParameter("mask length"));
        }
        Ok(())
    }

    fn write(&self, w: &mut FrameWriter<'_>) -> Result<(), EncodeError> {
        w.push(self.bank)?;
        w.extend(&self.bit_address.to_be_bytes())?;
        w.push(self.bit_length)?;
        w.extend(&self.data)
    }

    fn read(args: &mut ArgReader<'_>) -> Result<Self, EncodeError> {
        let bank = args.byte()?;
        let bit_address = u16::from_be_bytes(args.array()?);
        let bit_length = args.byte()?;
        let data = args.vec((bit_length as usize).div_ceil(8))?;
        Ok(Self {
            bank,
            bit_address,
            bit_length,
            data,
        })
    }
}

/// Tag memory bank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MemoryBank {
    /// Kill and access passwords
    Reserved,
    Epc,
    Tid,
    User,
}

impl MemoryBank {
    pub fn as_byte(self) -> u8 {
        match self {
            MemoryBank::Reserved => 0x00,
            MemoryBank::Epc => MEMBANK_EPC,
            MemoryBank::Tid => 0x02,
            MemoryBank::User => 0x03,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(MemoryBank::Reserved),
            MEMBANK_EPC => Some(MemoryBank::Epc),
            0x02 => Some(MemoryBank::Tid),
            0x03 => Some(MemoryBank::User),
            _ => None,
        }
    }
}

/// How a read request picks its tag
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TagSelector {
    /// The tag whose EPC matches exactly
    Epc(Epc),
    /// The first tag matching a memory mask
    Mask(InventoryMask),
}

/// Session flag or selected flag a Select command acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SelectTarget {
    S0,
    S1,
    S2,
    S3,
    Sl,
}

impl SelectTarget {
    pub fn as_byte(self) -> u8 {
        match self {
            SelectTarget::S0 => 0x00,
            SelectTarget::S1 => 0x01,
            SelectTarget::S2 => 0x02,
            SelectTarget::S3 => 0x03,
            SelectTarget::Sl => 0x04,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(SelectTarget::S0),
            0x01 => Some(SelectTarget::S1),
            0x02 => Some(SelectTarget::S2),
            0x03 => Some(SelectTarget::S3),
            0x04 => Some(SelectTarget::Sl),
            _ => None,
        }
    }
}

/// Parameters of a Select command
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SelectParams {
    /// Antenna bitmask, one bit per port
    pub antenna: u8,
    pub target: SelectTarget,
    /// Gen2 select action (0-7)
    pub action: u8,
    pub mask: InventoryMask,
    pub truncate: bool,
}

/// TID window read alongside the EPC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TidWindow {
    /// Start word address
    pub address: u8,
    /// Length in words (0-15)
    pub length: u8,
}

/// Full parameter set of a tag inventory round
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InventoryParams {
    /// Q value (bits 3-0) combined with flag bits 7-4
    pub q_value: u8,
    /// Session: S0-S3, or one of the automatic selectors (0xFE, 0xFF)
    pub session: u8,
    pub mask: Option<InventoryMask>,
    pub tid: Option<TidWindow>,
    pub target: Target,
    /// Antenna selector (0x80 = antenna 1 … 0x8F = antenna 16)
    pub antenna: Option<u8>,
    /// Round duration (× 100 ms); `None` lets the reader decide
    pub scan_time: Option<u8>,
}

impl Default for InventoryParams {
    fn default() -> Self {
        Self {
            q_value: 4,
            session: SESSION_SMART,
            mask: None,
            tid: None,
            target: Target::A,
            antenna: None,
            scan_time: Some(SCAN_TIME_CONTINUOUS),
        }
    }
}

impl InventoryParams {
    fn validate(&self) -> Result<(), EncodeError> {
        if !matches!(self.session, 0..=3 | SESSION_REFERENCE | SESSION_SMART) {
            return Err(EncodeError::InvalidParameter("session"));
        }
        if let Some(mask) = &self.mask {
            mask.validate()?;
        }
        if let Some(tid) = self.tid {
            if tid.length > 15 {
                return Err(EncodeError::InvalidParameter("tid length"));
            }
        }
        if let Some(antenna) = self.antenna {
            if !(0x80..=0x8F).contains(&antenna) {
                return Err(EncodeError::InvalidParameter("antenna"));
            }
        }
        if self.scan_time == Some(0) {
            return Err(EncodeError::InvalidParameter("scan time"));
        }
        Ok(())
    }

    fn write(&self, w: &mut FrameWriter<'_>) -> Result<(), EncodeError> {
        w.push(self.q_value)?;
        w.push(self.session)?;
        match &self.mask {
            Some(mask) => mask.write(w)?,
            None => {
                w.push(MEMBANK_EPC)?;
                w.extend(&[0x00, 0x00])?;
                w.push(0x00)?;
            }
        }
        let tid = self.tid.unwrap_or(TidWindow {
            address: 0,
            length: 0,
        });
        w.push(tid.address)?;
        w.push(tid.length)?;
        w.push(self.target.as_byte())?;
        if let Some(antenna) = self.antenna {
            w.push(antenna)?;
        }
        if let Some(scan_time) = self.scan_time {
            w.push(scan_time)?;
        }
        Ok(())
    }
}

/// Commands understood by the reader
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// One inventory round with the reference parameter set
    ///
    /// Encodes as `04 FE 00 80 <scan_time>`: Q=4, automatic session, no
    /// mask. The byte layout was captured from the vendor tool and is kept
    /// verbatim; it is not the full parameter table of
    /// [`Command::TagInventoryWith`].
    TagInventory { scan_time: u8 },
    /// One inventory round with explicit parameters
    TagInventoryWith(InventoryParams),
    SingleTagInventory,
    ObtainReaderInfo,
    ModifyFrequency {
        band: FrequencyBand,
        max_channel: u8,
        min_channel: u8,
    },
    ModifyReaderAddress(u8),
    /// Inventory time in 100 ms units (1-255)
    ModifyInventoryTime(u8),
    ModifyBaudRate(BaudRate),
    /// RF output power in dBm (0-30)
    ModifyRfPower(u8),
    /// Drive the reader LED and buzzer: on/off times in 50 ms units
    LedBuzzer {
        active_time: u8,
        silent_time: u8,
        times: u8,
    },
    SetupAntennaMux(u8),
    SetBuzzer(bool),
    ObtainReaderSerial,
    StartFastInventory(Target),
    StopFastInventory,
    SetAntennaCheck(bool),
    GetDataFromBuffer,
    ClearBuffer,
    GetTagCount,
    MeasureTemperature,
    SetWorkMode(u8),
    StopImmediately,
    /// Read `word_count` words (1-120) from `bank`, starting at `word_ptr`
    ReadData {
        selector: TagSelector,
        bank: MemoryBank,
        word_ptr: u8,
        word_count: u8,
        password: Password,
    },
    /// Write `data` (whole words, at most 120) into `bank` at `word_ptr`
    WriteData {
        epc: Epc,
        bank: MemoryBank,
        word_ptr: u8,
        data: Vec<u8, MAX_WRITE_BYTES>,
        password: Password,
    },
    WriteEpc {
        old_epc: Epc,
        new_epc: Epc,
        password: Password,
    },
    KillTag {
        epc: Epc,
        kill_password: Password,
    },
    /// Lock or unlock a memory area
    ///
    /// `select` picks the area (0 kill password, 1 access password, 2 EPC,
    /// 3 TID, 4 user) and `action` the lock state (0-3).
    SetProtection {
        epc: Epc,
        select: u8,
        action: u8,
        password: Password,
    },
    BlockErase {
        epc: Epc,
        bank: MemoryBank,
        word_ptr: u8,
        word_count: u8,
        password: Password,
    },
    Select(SelectParams),
    /// Drive the reader output pins, one bit per pin
    GpioControl(u8),
    ObtainGpioState,
}

impl Command {
    /// Wire command code
    pub fn code(&self) -> u8 {
        match self {
            Command::TagInventory { .. } | Command::TagInventoryWith(_) => CMD_TAG_INVENTORY,
            Command::SingleTagInventory => CMD_SINGLE_TAG_INVENTORY,
            Command::ObtainReaderInfo => CMD_OBTAIN_READER_INFO,
            Command::ModifyFrequency { .. } => CMD_MODIFY_FREQUENCY,
            Command::ModifyReaderAddress(_) => CMD_MODIFY_READER_ADDR,
            Command::ModifyInventoryTime(_) => CMD_MODIFY_INVENTORY_TIME,
            Command::ModifyBaudRate(_) => CMD_MODIFY_BAUD_RATE,
            Command::ModifyRfPower(_) => CMD_MODIFY_RF_POWER,
            Command::LedBuzzer { .. } => CMD_LED_BUZZER_CONTROL,
            Command::SetupAntennaMux(_) => CMD_SETUP_ANTENNA_MUX,
            Command::SetBuzzer(_) => CMD_ENABLE_BUZZER,
            Command::ObtainReaderSerial => CMD_OBTAIN_READER_SN,
            Command::StartFastInventory(_) => CMD_START_FAST_INVENTORY,
            Command::StopFastInventory => CMD_STOP_FAST_INVENTORY,
            Command::SetAntennaCheck(_) => CMD_ENABLE_ANTENNA_CHECK,
            Command::GetDataFromBuffer => CMD_GET_DATA_FROM_BUFFER,
            Command::ClearBuffer => CMD_CLEAR_BUFFER,
            Command::GetTagCount => CMD_GET_TAG_COUNT,
            Command::MeasureTemperature => CMD_MEASURE_TEMPERATURE,
            Command::SetWorkMode(_) => CMD_SET_WORK_MODE,
            Command::StopImmediately => CMD_STOP_IMMEDIATELY,
            Command::ReadData { .. } => CMD_READ_DATA,
            Command::WriteData { .. } => CMD_WRITE_DATA,
            Command::WriteEpc { .. } => CMD_WRITE_EPC,
            Command::KillTag { .. } => CMD_KILL_TAG,
            Command::SetProtection { .. } => CMD_SET_PROTECTION,
            Command::BlockErase { .. } => CMD_BLOCK_ERASE,
            Command::Select(_) => CMD_SELECT,
            Command::GpioControl(_) => CMD_GPIO_CONTROL,
            Command::ObtainGpioState => CMD_OBTAIN_GPIO_STATE,
        }
    }

    /// Build a command from its raw code and argument bytes
    ///
    /// Arguments are the payload bytes in wire order; commands without a
    /// payload take an empty slice.
    pub fn from_raw(code: u8, args: &[u8]) -> Result<Self, EncodeError> {
        let command = match code {
            CMD_TAG_INVENTORY => match args {
                [] => Command::TagInventory {
                    scan_time: SCAN_TIME_SINGLE,
                },
                [scan_time] => Command::TagInventory {
                    scan_time: *scan_time,
                },
                _ => return Err(EncodeError::InvalidParameter("argument count")),
            },
            CMD_SINGLE_TAG_INVENTORY => no_args(args, Command::SingleTagInventory)?,
            CMD_OBTAIN_READER_INFO => no_args(args, Command::ObtainReaderInfo)?,
            CMD_MODIFY_FREQUENCY => {
                let [max, min] = exact::<2>(args)?;
                let band = FrequencyBand::from_frequency_bytes(max, min)
                    .ok_or(EncodeError::InvalidParameter("frequency band"))?;
                Command::ModifyFrequency {
                    band,
                    max_channel: max & 0x3F,
                    min_channel: min & 0x3F,
                }
            }
            CMD_MODIFY_READER_ADDR => Command::ModifyReaderAddress(exact::<1>(args)?[0]),
            CMD_MODIFY_INVENTORY_TIME => Command::ModifyInventoryTime(exact::<1>(args)?[0]),
            CMD_MODIFY_BAUD_RATE => Command::ModifyBaudRate(
                BaudRate::from_index(exact::<1>(args)?[0])
                    .ok_or(EncodeError::InvalidParameter("baud rate index"))?,
            ),
            CMD_MODIFY_RF_POWER => Command::ModifyRfPower(exact::<1>(args)?[0]),
            CMD_LED_BUZZER_CONTROL => {
                let [active_time, silent_time, times] = exact::<3>(args)?;
                Command::LedBuzzer {
                    active_time,
                    silent_time,
                    times,
                }
            }
            CMD_SETUP_ANTENNA_MUX => Command::SetupAntennaMux(exact::<1>(args)?[0]),
            CMD_ENABLE_BUZZER => Command::SetBuzzer(exact::<1>(args)?[0] != 0),
            CMD_OBTAIN_READER_SN => no_args(args, Command::ObtainReaderSerial)?,
            CMD_START_FAST_INVENTORY => match args {
                [] => Command::StartFastInventory(Target::A),
                [target] => Command::StartFastInventory(
                    Target::from_byte(*target).ok_or(EncodeError::InvalidParameter("target"))?,
                ),
                _ => return Err(EncodeError::InvalidParameter("argument count")),
            },
            CMD_STOP_FAST_INVENTORY => no_args(args, Command::StopFastInventory)?,
            CMD_ENABLE_ANTENNA_CHECK => Command::SetAntennaCheck(exact::<1>(args)?[0] != 0),
            CMD_GET_DATA_FROM_BUFFER => no_args(args, Command::GetDataFromBuffer)?,
            CMD_CLEAR_BUFFER => no_args(args, Command::ClearBuffer)?,
            CMD_GET_TAG_COUNT => no_args(args, Command::GetTagCount)?,
            CMD_MEASURE_TEMPERATURE => no_args(args, Command::MeasureTemperature)?,
            CMD_SET_WORK_MODE => Command::SetWorkMode(exact::<1>(args)?[0]),
            CMD_STOP_IMMEDIATELY => no_args(args, Command::StopImmediately)?,
            CMD_GPIO_CONTROL => Command::GpioControl(exact::<1>(args)?[0]),
            CMD_OBTAIN_GPIO_STATE => no_args(args, Command::ObtainGpioState)?,
            CMD_READ_DATA
            | CMD_WRITE_DATA
            | CMD_WRITE_EPC
            | CMD_KILL_TAG
            | CMD_SET_PROTECTION
            | CMD_BLOCK_ERASE
            | CMD_SELECT => {
                let mut reader = ArgReader::new(args);
                let command = Self::read_access(code, &mut reader)?;
                reader.finish()?;
                command
            }
            other => return Err(EncodeError::UnknownCommand(other)),
        };
        command.validate()?;
        Ok(command)
    }

    /// Check every argument against its documented range
    pub fn validate(&self) -> Result<(), EncodeError> {
        match self {
            Command::TagInventory { scan_time } if *scan_time == 0 => {
                Err(EncodeError::InvalidParameter("scan time"))
            }
            Command::TagInventoryWith(params) => params.validate(),
            Command::ModifyFrequency {
                max_channel,
                min_channel,
                ..
            } => {
                if *max_channel > MAX_CHANNEL || *min_channel > MAX_CHANNEL {
                    Err(EncodeError::InvalidParameter("frequency channel"))
                } else if min_channel > max_channel {
                    Err(EncodeError::InvalidParameter("frequency range"))
                } else {
                    Ok(())
                }
            }
            Command::ModifyReaderAddress(crate::ADDR_BROADCAST) => {
                Err(EncodeError::InvalidParameter("reader address"))
            }
            Command::ModifyInventoryTime(0) => Err(EncodeError::InvalidParameter("inventory time")),
            Command::ModifyRfPower(power) if *power > MAX_RF_POWER => {
                Err(EncodeError::InvalidParameter("rf power"))
            }
            Command::ReadData {
                selector,
                word_count,
                ..
            } => {
                match selector {
                    TagSelector::Epc(epc) => check_epc(epc)?,
                    TagSelector::Mask(mask) => mask.validate()?,
                }
                check_word_count(*word_count)
            }
            Command::WriteData { epc, data, .. } => {
                check_epc(epc)?;
                if data.is_empty() || data.len() % 2 != 0 {
                    return Err(EncodeError::InvalidParameter("write data"));
                }
                Ok(())
            }
            Command::WriteEpc {
                old_epc, new_epc, ..
            } => {
                check_epc(old_epc)?;
                check_epc(new_epc)
            }
            Command::KillTag { epc, .. } => check_epc(epc),
            Command::SetProtection {
                epc,
                select,
                action,
                ..
            } => {
                check_epc(epc)?;
                if *select > 4 {
                    return Err(EncodeError::InvalidParameter("protection area"));
                }
                if *action > 3 {
                    return Err(EncodeError::InvalidParameter("protection action"));
                }
                Ok(())
            }
            Command::BlockErase {
                epc, word_count, ..
            } => {
                check_epc(epc)?;
                check_word_count(*word_count)
            }
            Command::Select(params) => {
                if params.action > 7 {
                    return Err(EncodeError::InvalidParameter("select action"));
                }
                params.mask.validate()
            }
            _ => Ok(()),
        }
    }

    /// Encode this command for `address` into `buffer`
    ///
    /// Returns the number of bytes written.
    pub fn encode(&self, address: u8, buffer: &mut [u8]) -> Result<usize, EncodeError> {
        self.validate()?;

        let mut w = FrameWriter::start(buffer, address, self.code())?;
        match self {
            Command::TagInventory { scan_time } => {
                w.extend(&[0x04, SESSION_REFERENCE, 0x00, 0x80, *scan_time])?;
            }
            Command::TagInventoryWith(params) => params.write(&mut w)?,
            Command::ModifyFrequency {
                band,
                max_channel,
                min_channel,
            } => {
                let (max, min) = band.frequency_bytes(*max_channel, *min_channel);
                w.extend(&[max, min])?;
            }
            Command::ModifyReaderAddress(value)
            | Command::ModifyInventoryTime(value)
            | Command::ModifyRfPower(value)
            | Command::SetupAntennaMux(value)
            | Command::SetWorkMode(value) => w.push(*value)?,
            Command::ModifyBaudRate(rate) => w.push(rate.index())?,
            Command::LedBuzzer {
                active_time,
                silent_time,
                times,
            } => w.extend(&[*active_time, *silent_time, *times])?,
            Command::SetBuzzer(on) | Command::SetAntennaCheck(on) => w.push(*on as u8)?,
            Command::StartFastInventory(target) => w.push(target.as_byte())?,
            Command::ReadData {
                selector,
                bank,
                word_ptr,
                word_count,
                password,
            } => match selector {
                TagSelector::Epc(epc) => {
                    write_epc(&mut w, epc)?;
                    w.extend(&[bank.as_byte(), *word_ptr, *word_count])?;
                    w.extend(password)?;
                }
                TagSelector::Mask(mask) => {
                    w.extend(&[ENUM_MASK_MODE, bank.as_byte(), *word_ptr, *word_count])?;
                    w.extend(password)?;
                    mask.write(&mut w)?;
                }
            },
            Command::WriteData {
                epc,
                bank,
                word_ptr,
                data,
                password,
            } => {
                w.push((data.len() / 2) as u8)?;
                write_epc(&mut w, epc)?;
                w.extend(&[bank.as_byte(), *word_ptr])?;
                w.extend(data)?;
                w.extend(password)?;
            }
            Command::WriteEpc {
                old_epc,
                new_epc,
                password,
            } => {
                write_epc(&mut w, old_epc)?;
                write_epc(&mut w, new_epc)?;
                w.extend(password)?;
            }
            Command::KillTag { epc, kill_password } => {
                write_epc(&mut w, epc)?;
                w.extend(kill_password)?;
            }
            Command::SetProtection {
                epc,
                select,
                action,
                password,
            } => {
                write_epc(&mut w, epc)?;
                w.extend(&[*select, *action])?;
                w.extend(password)?;
            }
            Command::BlockErase {
                epc,
                bank,
                word_ptr,
                word_count,
                password,
            } => {
                write_epc(&mut w, epc)?;
                w.extend(&[bank.as_byte(), *word_ptr, *word_count])?;
                w.extend(password)?;
            }
            Command::Select(params) => {
                w.extend(&[params.antenna, params.target.as_byte(), params.action])?;
                params.mask.write(&mut w)?;
                w.push(params.truncate as u8)?;
            }
            Command::GpioControl(pins) => w.push(*pins)?,
            Command::SingleTagInventory
            | Command::ObtainGpioState
            | Command::ObtainReaderInfo
            | Command::ObtainReaderSerial
            | Command::StopFastInventory
            | Command::GetDataFromBuffer
            | Command::ClearBuffer
            | Command::GetTagCount
            | Command::MeasureTemperature
            | Command::StopImmediately => {}
        }
        w.finish()
    }

    /// Encode this command into a heapless Vec
    pub fn encode_to_vec(&self, address: u8) -> Result<Vec<u8, MAX_FRAME_SIZE>, EncodeError> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = self.encode(address, &mut buffer)?;
        let mut vec = Vec::new();
        vec.extend_from_slice(&buffer[..len])
            .map_err(|_| EncodeError::BufferTooSmall)?;
        Ok(vec)
    }

    /// Parse the variable-length arguments of a tag access command
    fn read_access(code: u8, args: &mut ArgReader<'_>) -> Result<Self, EncodeError> {
        let command = match code {
            CMD_READ_DATA => {
                let words = args.byte()?;
                let selector = if words == ENUM_MASK_MODE {
                    None
                } else {
                    Some(TagSelector::Epc(args.vec(words as usize * 2)?))
                };
                let bank = args.bank()?;
                let word_ptr = args.byte()?;
                let word_count = args.byte()?;
                let password = args.array()?;
                let selector = match selector {
                    Some(selector) => selector,
                    None => TagSelector::Mask(InventoryMask::read(args)?),
                };
                Command::ReadData {
                    selector,
                    bank,
                    word_ptr,
                    word_count,
                    password,
                }
            }
            CMD_WRITE_DATA => {
                let words = args.byte()?;
                let epc = args.epc()?;
                let bank = args.bank()?;
                let word_ptr = args.byte()?;
                let data = args.vec(words as usize * 2)?;
                Command::WriteData {
                    epc,
                    bank,
                    word_ptr,
                    data,
                    password: args.array()?,
                }
            }
            CMD_WRITE_EPC => Command::WriteEpc {
                old_epc: args.epc()?,
                new_epc: args.epc()?,
                password: args.array()?,
            },
            CMD_KILL_TAG => Command::KillTag {
                epc: args.epc()?,
                kill_password: args.array()?,
            },
            CMD_SET_PROTECTION => Command::SetProtection {
                epc: args.epc()?,
                select: args.byte()?,
                action: args.byte()?,
                password: args.array()?,
            },
            CMD_BLOCK_ERASE => Command::BlockErase {
                epc: args.epc()?,
                bank: args.bank()?,
                word_ptr: args.byte()?,
                word_count: args.byte()?,
                password: args.array()?,
            },
            CMD_SELECT => {
                let [antenna, target, action] = args.array::<3>()?;
                let target = SelectTarget::from_byte(target)
                    .ok_or(EncodeError::InvalidParameter("select target"))?;
                let mask = InventoryMask::read(args)?;
                Command::Select(SelectParams {
                    antenna,
                    target,
                    action,
                    mask,
                    truncate: args.byte()? != 0,
                })
            }
            other => return Err(EncodeError::UnknownCommand(other)),
        };
        Ok(command)
    }
}

/// Human-readable name of a command or response-command code
pub fn command_name(code: u8) -> &'static str {
    match code {
        CMD_TAG_INVENTORY => "tag inventory",
        CMD_SINGLE_TAG_INVENTORY => "single tag inventory",
        CMD_OBTAIN_READER_INFO => "obtain reader info",
        CMD_MODIFY_FREQUENCY => "modify frequency",
        CMD_MODIFY_READER_ADDR => "modify reader address",
        CMD_MODIFY_INVENTORY_TIME => "modify inventory time",
        CMD_MODIFY_BAUD_RATE => "modify baud rate",
        CMD_MODIFY_RF_POWER => "modify rf power",
        CMD_LED_BUZZER_CONTROL => "led/buzzer control",
        CMD_SETUP_ANTENNA_MUX => "setup antenna mux",
        CMD_ENABLE_BUZZER => "enable buzzer",
        CMD_OBTAIN_READER_SN => "obtain reader serial",
        CMD_START_FAST_INVENTORY => "start fast inventory",
        CMD_STOP_FAST_INVENTORY => "stop fast inventory",
        CMD_ENABLE_ANTENNA_CHECK => "antenna check",
        CMD_GET_DATA_FROM_BUFFER => "get data from buffer",
        CMD_CLEAR_BUFFER => "clear buffer",
        CMD_GET_TAG_COUNT => "get tag count",
        CMD_SET_WORK_MODE => "set work mode",
        CMD_MEASURE_TEMPERATURE => "measure temperature",
        CMD_STOP_IMMEDIATELY => "stop immediately",
        CMD_READ_DATA => "read data",
        CMD_WRITE_DATA => "write data",
        CMD_WRITE_EPC => "write epc",
        CMD_KILL_TAG => "kill tag",
        CMD_SET_PROTECTION => "set protection",
        CMD_BLOCK_ERASE => "block erase",
        CMD_SELECT => "select",
        CMD_GPIO_CONTROL => "gpio control",
        CMD_OBTAIN_GPIO_STATE => "obtain gpio state",
        RECMD_AUTO_UPLOAD => "auto-upload tag",
        _ => "unknown command",
    }
}

fn no_args(args: &[u8], command: Command) -> Result<Command, EncodeError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(EncodeError::InvalidParameter("argument count"))
    }
}

fn exact<const N: usize>(args: &[u8]) -> Result<[u8; N], EncodeError> {
    <[u8; N]>::try_from(args).map_err(|_| EncodeError::InvalidParameter("argument count"))
}

fn check_epc(epc: &[u8]) -> Result<(), EncodeError> {
    if epc.is_empty() || epc.len() % 2 != 0 {
        return Err(EncodeError::InvalidParameter("epc length"));
    }
    Ok(())
}

fn check_word_count(count: u8) -> Result<(), EncodeError> {
    if count == 0 || count > MAX_ACCESS_WORDS {
        return Err(EncodeError::InvalidParameter("word count"));
    }
    Ok(())
}

/// EPC prefixed by its length in words
fn write_epc(w: &mut FrameWriter<'_>, epc: &[u8]) -> Result<(), EncodeError> {
    w.push((epc.len() / 2) as u8)?;
    w.extend(epc)
}

/// Cursor over raw argument bytes
struct ArgReader<'a> {
    args: &'a [u8],
}

impl<'a> ArgReader<'a> {
    fn new(args: &'a [u8]) -> Self {
        Self { args }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], EncodeError> {
        if self.args.len() < n {
            return Err(EncodeError::InvalidParameter("argument count"));
        }
        let (head, rest) = self.args.split_at(n);
        self.args = rest;
        Ok(head)
    }

    fn byte(&mut self) -> Result<u8, EncodeError> {
        Ok(self.take(1)?[0])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], EncodeError> {
        exact::<N>(self.take(N)?)
    }

    fn vec<const N: usize>(&mut self, n: usize) -> Result<Vec<u8, N>, EncodeError> {
        let bytes = self.take(n)?;
        Vec::from_slice(bytes).map_err(|_| EncodeError::PayloadTooLarge)
    }

    fn bank(&mut self) -> Result<MemoryBank, EncodeError> {
        MemoryBank::from_byte(self.byte()?).ok_or(EncodeError::InvalidParameter("memory bank"))
    }

    /// EPC prefixed by its length in words
    fn epc(&mut self) -> Result<Epc, EncodeError> {
        let words = self.byte()?;
        self.vec(words as usize * 2)
    }

    fn finish(self) -> Result<(), EncodeError> {
        if self.args.is_empty() {
            Ok(())
        } else {
            Err(EncodeError::InvalidParameter("argument count"))
        }
    }
}

/// Cursor writing one frame into a caller-provided buffer
struct FrameWriter<'a> {
    buffer: &'a mut [u8],
    len: usize,
}

impl<'a> FrameWriter<'a> {
    fn start(buffer: &'a mut [u8], address: u8, code: u8) -> Result<Self, EncodeError> {
        let mut w = Self { buffer, len: 0 };
        // Length placeholder, patched in finish()
        w.push(0)?;
        w.push(address)?;
        w.push(code)?;
        Ok(w)
    }

    fn push(&mut self, byte: u8) -> Result<(), EncodeError> {
        if self.len + CRC_LEN >= MAX_FRAME_SIZE {
            return Err(EncodeError::PayloadTooLarge);
        }
        let slot = self
            .buffer
            .get_mut(self.len)
            .ok_or(EncodeError::BufferTooSmall)?;
        *slot = byte;
        self.len += 1;
        Ok(())
    }

    fn extend(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        bytes.iter().try_for_each(|&b| self.push(b))
    }

    fn finish(self) -> Result<usize, EncodeError> {
        let total = self.len + CRC_LEN;
        if self.buffer.len() < total {
            return Err(EncodeError::BufferTooSmall);
        }
        self.buffer[0] = (total - 1) as u8;
        let crc = crc16(&self.buffer[..self.len]);
        self.buffer[self.len..total].copy_from_slice(&crc.to_le_bytes());
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::verify;

    fn encode(command: &Command) -> Vec<u8, MAX_FRAME_SIZE> {
        command.encode_to_vec(0x00).unwrap()
    }

    #[test]
    fn test_stop_immediately_layout() {
        let frame = encode(&Command::StopImmediately);
        let crc = crc16(&[0x04, 0x00, 0x93]);
        assert_eq!(
            frame.as_slice(),
            &[0x04, 0x00, 0x93, crc as u8, (crc >> 8) as u8]
        );
    }

    #[test]
    fn test_every_frame_has_valid_crc_and_length() {
        let commands = [
            Command::ObtainReaderInfo,
            Command::StopImmediately,
            Command::SetWorkMode(0),
            Command::StartFastInventory(Target::B),
            Command::StopFastInventory,
            Command::TagInventory {
                scan_time: SCAN_TIME_SINGLE,
            },
            Command::ModifyRfPower(30),
            Command::SetAntennaCheck(false),
            Command::LedBuzzer {
                active_time: 2,
                silent_time: 2,
                times: 1,
            },
            Command::GetTagCount,
            Command::ClearBuffer,
            Command::MeasureTemperature,
        ];
        for command in commands {
            let frame = encode(&command);
            assert!(verify(&frame), "{:?}", command);
            assert_eq!(frame[0] as usize + 1, frame.len());
            assert_eq!(frame[2], command.code());
        }
    }

    #[test]
    fn test_reference_inventory_payload() {
        let frame = encode(&Command::TagInventory {
            scan_time: SCAN_TIME_SINGLE,
        });
        assert_eq!(&frame[..8], &[0x09, 0x00, 0x01, 0x04, 0xFE, 0x00, 0x80, 0x32]);

        let frame = encode(&Command::TagInventory {
            scan_time: SCAN_TIME_CONTINUOUS,
        });
        assert_eq!(frame[7], 0x0A);
    }

    #[test]
    fn test_full_inventory_params() {
        let params = InventoryParams {
            q_value: 4,
            session: 0,
            mask: None,
            tid: None,
            target: Target::A,
            antenna: Some(0x80),
            scan_time: Some(10),
        };
        let frame = encode(&Command::TagInventoryWith(params));
        // q, session, bank, addr(2), len, tid addr, tid len, target, ant, scan
        assert_eq!(
            &frame[3..14],
            &[0x04, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x80, 0x0A]
        );
        assert_eq!(frame[0], 15);
    }

    #[test]
    fn test_inventory_mask_written_msb_first() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0xE2, 0x00]).unwrap();
        let params = InventoryParams {
            mask: Some(InventoryMask {
                bank: MEMBANK_EPC,
                bit_address: 0x0120,
                bit_length: 16,
                data,
            }),
            scan_time: None,
            ..InventoryParams::default()
        };
        let frame = encode(&Command::TagInventoryWith(params));
        assert_eq!(&frame[5..11], &[0x01, 0x01, 0x20, 0x10, 0xE2, 0x00]);
    }

    #[test]
    fn test_inventory_mask_length_checked() {
        let params = InventoryParams {
            mask: Some(InventoryMask {
                bank: MEMBANK_EPC,
                bit_address: 0,
                bit_length: 12,
                data: Vec::new(),
            }),
            ..InventoryParams::default()
        };
        assert_eq!(
            Command::TagInventoryWith(params).validate(),
            Err(EncodeError::InvalidParameter("mask length"))
        );
    }

    #[test]
    fn test_rf_power_range() {
        assert!(Command::ModifyRfPower(0).encode_to_vec(0).is_ok());
        assert_eq!(
            Command::ModifyRfPower(31).encode_to_vec(0),
            Err(EncodeError::InvalidParameter("rf power"))
        );
    }

    #[test]
    fn test_frequency_band_bits() {
        let frame = encode(&Command::ModifyFrequency {
            band: FrequencyBand::Eu,
            max_channel: 14,
            min_channel: 0,
        });
        // Eu = 0b0100: high pair 01 in max byte, low pair 00 in min byte
        assert_eq!(&frame[3..5], &[0x40 | 14, 0x00]);

        let frame = encode(&Command::ModifyFrequency {
            band: FrequencyBand::Korea,
            max_channel: 19,
            min_channel: 0,
        });
        assert_eq!(&frame[3..5], &[19, 0xC0]);
        assert_eq!(
            FrequencyBand::from_frequency_bytes(frame[3], frame[4]),
            Some(FrequencyBand::Korea)
        );
    }

    #[test]
    fn test_frequency_range_checked() {
        let bad = Command::ModifyFrequency {
            band: FrequencyBand::Us,
            max_channel: 3,
            min_channel: 5,
        };
        assert_eq!(
            bad.validate(),
            Err(EncodeError::InvalidParameter("frequency range"))
        );
        let bad = Command::ModifyFrequency {
            band: FrequencyBand::Us,
            max_channel: 63,
            min_channel: 0,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_buffer_too_small() {
        let mut buffer = [0u8; 4];
        assert_eq!(
            Command::StopImmediately.encode(0, &mut buffer),
            Err(EncodeError::BufferTooSmall)
        );
    }

    #[test]
    fn test_from_raw() {
        assert_eq!(
            Command::from_raw(0x2F, &[20]),
            Ok(Command::ModifyRfPower(20))
        );
        assert_eq!(
            Command::from_raw(0x2F, &[40]),
            Err(EncodeError::InvalidParameter("rf power"))
        );
        assert_eq!(
            Command::from_raw(0x93, &[1]),
            Err(EncodeError::InvalidParameter("argument count"))
        );
        assert_eq!(
            Command::from_raw(0x28, &[3]),
            Err(EncodeError::InvalidParameter("baud rate index"))
        );
        assert_eq!(Command::from_raw(0x99, &[]), Err(EncodeError::UnknownCommand(0x99)));
        assert_eq!(
            Command::from_raw(0x50, &[]),
            Ok(Command::StartFastInventory(Target::A))
        );
        assert_eq!(
            Command::from_raw(0x22, &[0x40 | 10, 0x02]),
            Ok(Command::ModifyFrequency {
                band: FrequencyBand::Eu,
                max_channel: 10,
                min_channel: 2,
            })
        );
    }

    fn epc(bytes: &[u8]) -> Epc {
        Vec::from_slice(bytes).unwrap()
    }

    const PASSWORD: Password = [0x00, 0x00, 0x12, 0x34];

    #[test]
    fn test_read_data_epc_mode() {
        let command = Command::ReadData {
            selector: TagSelector::Epc(epc(&[0xE2, 0x00, 0x11, 0x22])),
            bank: MemoryBank::Tid,
            word_ptr: 0,
            word_count: 6,
            password: PASSWORD,
        };
        let frame = encode(&command);
        assert!(verify(&frame));
        // ENum, EPC, bank, ptr, count, password
        assert_eq!(
            &frame[2..15],
            &[0x02, 0x02, 0xE2, 0x00, 0x11, 0x22, 0x02, 0x00, 0x06, 0x00, 0x00, 0x12, 0x34]
        );
        assert_eq!(frame.len(), 17);
        assert_eq!(Command::from_raw(0x02, &frame[3..15]), Ok(command));
    }

    #[test]
    fn test_read_data_mask_mode() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0xE2, 0x80]).unwrap();
        let command = Command::ReadData {
            selector: TagSelector::Mask(InventoryMask {
                bank: MEMBANK_EPC,
                bit_address: 0x0020,
                bit_length: 12,
                data,
            }),
            bank: MemoryBank::User,
            word_ptr: 2,
            word_count: 1,
            password: [0; 4],
        };
        let frame = encode(&command);
        // ENum 0xFF, bank, ptr, count, password, then the mask
        assert_eq!(
            &frame[3..17],
            &[0xFF, 0x03, 0x02, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x20, 0x0C, 0xE2, 0x80]
        );
        assert_eq!(frame[0] as usize + 1, frame.len());
        let args = &frame[3..frame.len() - 2];
        assert_eq!(Command::from_raw(0x02, args), Ok(command));
    }

    #[test]
    fn test_read_data_word_count_range() {
        let read = |word_count| Command::ReadData {
            selector: TagSelector::Epc(epc(&[0x30, 0x00])),
            bank: MemoryBank::Epc,
            word_ptr: 0,
            word_count,
            password: [0; 4],
        };
        assert!(read(1).validate().is_ok());
        assert!(read(120).validate().is_ok());
        assert_eq!(
            read(0).validate(),
            Err(EncodeError::InvalidParameter("word count"))
        );
        assert_eq!(
            read(121).validate(),
            Err(EncodeError::InvalidParameter("word count"))
        );
    }

    #[test]
    fn test_write_data_layout() {
        let command = Command::WriteData {
            epc: epc(&[0xAA, 0xBB]),
            bank: MemoryBank::User,
            word_ptr: 4,
            data: Vec::from_slice(&[0x01, 0x02, 0x03, 0x04]).unwrap(),
            password: PASSWORD,
        };
        let frame = encode(&command);
        // WNum, ENum, EPC, bank, ptr, data, password
        assert_eq!(
            &frame[3..16],
            &[0x02, 0x01, 0xAA, 0xBB, 0x03, 0x04, 0x01, 0x02, 0x03, 0x04, 0x00, 0x00, 0x12]
        );
        let args = &frame[3..frame.len() - 2];
        assert_eq!(Command::from_raw(0x03, args), Ok(command));
    }

    #[test]
    fn test_write_data_rejects_partial_words_and_oversize() {
        let odd = Command::WriteData {
            epc: epc(&[0xAA, 0xBB]),
            bank: MemoryBank::User,
            word_ptr: 0,
            data: Vec::from_slice(&[0x01, 0x02, 0x03]).unwrap(),
            password: [0; 4],
        };
        assert_eq!(
            odd.validate(),
            Err(EncodeError::InvalidParameter("write data"))
        );

        let mut data = Vec::new();
        data.resize(MAX_WRITE_BYTES, 0x55).unwrap();
        let oversize = Command::WriteData {
            epc: epc(&[0x11; 12]),
            bank: MemoryBank::User,
            word_ptr: 0,
            data,
            password: [0; 4],
        };
        assert_eq!(oversize.encode_to_vec(0), Err(EncodeError::PayloadTooLarge));
    }

    #[test]
    fn test_write_epc_kill_and_erase_layouts() {
        let command = Command::WriteEpc {
            old_epc: epc(&[0x11, 0x22]),
            new_epc: epc(&[0x33, 0x44, 0x55, 0x66]),
            password: PASSWORD,
        };
        let frame = encode(&command);
        assert_eq!(
            &frame[2..15],
            &[0x04, 0x01, 0x11, 0x22, 0x02, 0x33, 0x44, 0x55, 0x66, 0x00, 0x00, 0x12, 0x34]
        );
        assert_eq!(Command::from_raw(0x04, &frame[3..15]), Ok(command));

        let command = Command::KillTag {
            epc: epc(&[0x11, 0x22]),
            kill_password: [0xDE, 0xAD, 0xBE, 0xEF],
        };
        let frame = encode(&command);
        assert_eq!(
            &frame[2..10],
            &[0x05, 0x01, 0x11, 0x22, 0xDE, 0xAD, 0xBE, 0xEF]
        );
        assert_eq!(Command::from_raw(0x05, &frame[3..10]), Ok(command));

        let command = Command::BlockErase {
            epc: epc(&[0x11, 0x22]),
            bank: MemoryBank::User,
            word_ptr: 0,
            word_count: 8,
            password: PASSWORD,
        };
        let frame = encode(&command);
        assert_eq!(
            &frame[2..13],
            &[0x07, 0x01, 0x11, 0x22, 0x03, 0x00, 0x08, 0x00, 0x00, 0x12, 0x34]
        );
        assert_eq!(Command::from_raw(0x07, &frame[3..13]), Ok(command));
    }

    #[test]
    fn test_set_protection() {
        let lock = |select, action| Command::SetProtection {
            epc: epc(&[0x11, 0x22]),
            select,
            action,
            password: PASSWORD,
        };
        let frame = encode(&lock(2, 1));
        assert_eq!(
            &frame[2..11],
            &[0x06, 0x01, 0x11, 0x22, 0x02, 0x01, 0x00, 0x00, 0x12]
        );
        assert_eq!(
            lock(5, 0).validate(),
            Err(EncodeError::InvalidParameter("protection area"))
        );
        assert_eq!(
            lock(0, 4).validate(),
            Err(EncodeError::InvalidParameter("protection action"))
        );
    }

    #[test]
    fn test_access_commands_need_whole_word_epc() {
        let kill = |bytes: &[u8]| Command::KillTag {
            epc: epc(bytes),
            kill_password: [0; 4],
        };
        assert_eq!(
            kill(&[]).validate(),
            Err(EncodeError::InvalidParameter("epc length"))
        );
        assert_eq!(
            kill(&[0x11, 0x22, 0x33]).validate(),
            Err(EncodeError::InvalidParameter("epc length"))
        );
    }

    #[test]
    fn test_select_layout() {
        let command = Command::Select(SelectParams {
            antenna: 0x01,
            target: SelectTarget::Sl,
            action: 0,
            mask: InventoryMask {
                bank: MEMBANK_EPC,
                bit_address: 0x0020,
                bit_length: 16,
                data: Vec::from_slice(&[0xE2, 0x00]).unwrap(),
            },
            truncate: false,
        });
        let frame = encode(&command);
        assert_eq!(
            &frame[2..13],
            &[0x9A, 0x01, 0x04, 0x00, 0x01, 0x00, 0x20, 0x10, 0xE2, 0x00, 0x00]
        );
        assert_eq!(frame[0], 14);
        assert_eq!(Command::from_raw(0x9A, &frame[3..13]), Ok(command));
        assert_eq!(
            Command::from_raw(0x9A, &[0x01, 0x05, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]),
            Err(EncodeError::InvalidParameter("select target"))
        );
    }

    #[test]
    fn test_gpio_commands() {
        let frame = encode(&Command::GpioControl(0b0000_0011));
        assert_eq!(&frame[..4], &[0x05, 0x00, 0x46, 0x03]);
        assert_eq!(
            Command::from_raw(0x46, &[0x03]),
            Ok(Command::GpioControl(0x03))
        );

        let frame = encode(&Command::ObtainGpioState);
        assert_eq!(&frame[..3], &[0x04, 0x00, 0x47]);
        assert_eq!(
            Command::from_raw(0x47, &[]),
            Ok(Command::ObtainGpioState)
        );
    }

    #[test]
    fn test_access_from_raw_rejects_trailing_and_short_args() {
        assert_eq!(
            Command::from_raw(0x05, &[0x01, 0x11, 0x22, 0x00, 0x00, 0x00]),
            Err(EncodeError::InvalidParameter("argument count"))
        );
        assert_eq!(
            Command::from_raw(0x05, &[0x01, 0x11, 0x22, 0x00, 0x00, 0x00, 0x00, 0x99]),
            Err(EncodeError::InvalidParameter("argument count"))
        );
        assert_eq!(
            Command::from_raw(0x07, &[0x01, 0x11, 0x22, 0x09, 0x00, 0x01, 0, 0, 0, 0]),
            Err(EncodeError::InvalidParameter("memory bank"))
        );
    }

    #[test]
    fn test_broadcast_address_encoding() {
        let frame = Command::ObtainReaderInfo.encode_to_vec(crate::ADDR_BROADCAST).unwrap();
        assert_eq!(frame[1], 0xFF);
        assert!(verify(&frame));
    }
}
