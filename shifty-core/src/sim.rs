//! Simulated programmer board for tests
//!
//! Two cascaded shift registers feed the chip's address pins, the data bus is
//! shared between the programmer and the chip, and the chip itself behaves
//! like a 28C-series EEPROM: a /WE rising edge starts an internal program
//! cycle, during which reads return the complement of bit 7 (data polling).
//! All pins share one `Board` so that timing and ordering can be checked.

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal_1::delay::DelayNs;
use embedded_hal_1::digital::{self, ErrorKind, ErrorType, InputPin, OutputPin};

use crate::address::{LatchPolicy, ShiftRegisterLatch};
use crate::data_bus::{DataBus, DATA_BUS_WIDTH};
use crate::pin::DataLine;
use crate::programmer::{ParallelProgrammer, ProgrammerConfig};

/// Default internal program time, same as the 28C64 t_WC
const DEFAULT_PROGRAM_TIME_US: u64 = 1000;

/// Single-ended board lines
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Line {
    Clock,
    Data,
    Latch,
    OutputEnable,
    WriteEnable,
}

impl Line {
    fn index(self) -> usize {
        match self {
            Line::Clock => 0,
            Line::Data => 1,
            Line::Latch => 2,
            Line::OutputEnable => 3,
            Line::WriteEnable => 4,
        }
    }
}

/// Observable things that happened on the board, in order
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A line changed its level
    Line(Line, bool),
    /// Shift register content moved to the address pins
    Latched(u16),
    /// The chip accepted a program command (address, data)
    Programmed(u16, u8),
}

#[derive(Copy, Clone, Debug)]
struct PendingWrite {
    address: u16,
    value: u8,
    ready_at_ns: u64,
}

pub struct Board {
    now_ns: u64,
    levels: [bool; 5],
    shift: u16,
    latched: u16,
    shift_clocks: usize,
    latch_pulses: usize,
    /// Output register of each data line, kept while the line is an input
    bus_out_level: [bool; DATA_BUS_WIDTH],
    bus_output: [bool; DATA_BUS_WIDTH],
    /// Last level seen on each data wire; a floating wire keeps it
    bus_wire: [bool; DATA_BUS_WIDTH],
    memory: Vec<u8>,
    attached: bool,
    stuck: bool,
    program_time_ns: u64,
    pending: Option<PendingWrite>,
    contention: usize,
    events: Vec<Event>,
}

pub type SimLatch = ShiftRegisterLatch<SimPin, SimPin, SimPin>;
pub type SimProgrammer<'c> = ParallelProgrammer<'c, SimLatch, SimDataLine, SimPin, SimPin, SimDelay>;

impl Board {
    fn new(memory: Vec<u8>, attached: bool) -> Self {
        let mut levels = [false; 5];
        // /OE and /WE are pulled up
        levels[Line::OutputEnable.index()] = true;
        levels[Line::WriteEnable.index()] = true;

        Self {
            now_ns: 0,
            levels,
            shift: 0,
            latched: 0,
            shift_clocks: 0,
            latch_pulses: 0,
            bus_out_level: [false; DATA_BUS_WIDTH],
            bus_output: [false; DATA_BUS_WIDTH],
            bus_wire: [false; DATA_BUS_WIDTH],
            memory,
            attached,
            stuck: false,
            program_time_ns: DEFAULT_PROGRAM_TIME_US * 1000,
            pending: None,
            contention: 0,
            events: Vec::new(),
        }
    }

    /// Board with a chip holding `memory` as its power-on content
    pub fn shared(memory: Vec<u8>) -> Rc<RefCell<Board>> {
        assert!(!memory.is_empty());
        Rc::new(RefCell::new(Board::new(memory, true)))
    }

    /// Board with an empty socket
    pub fn detached() -> Rc<RefCell<Board>> {
        Rc::new(RefCell::new(Board::new(Vec::new(), false)))
    }

    pub fn pin(board: &Rc<RefCell<Board>>, line: Line) -> SimPin {
        SimPin {
            board: Rc::clone(board),
            line,
        }
    }

    pub fn data_lines(board: &Rc<RefCell<Board>>) -> [SimDataLine; DATA_BUS_WIDTH] {
        core::array::from_fn(|index| SimDataLine {
            board: Rc::clone(board),
            index,
        })
    }

    pub fn latch(board: &Rc<RefCell<Board>>, policy: LatchPolicy) -> SimLatch {
        ShiftRegisterLatch::new(
            Board::pin(board, Line::Clock),
            Board::pin(board, Line::Data),
            Board::pin(board, Line::Latch),
            policy,
        )
    }

    pub fn programmer<'c>(
        board: &Rc<RefCell<Board>>,
        policy: LatchPolicy,
        config: ProgrammerConfig,
    ) -> SimProgrammer<'c> {
        ParallelProgrammer::new(
            Board::latch(board, policy),
            DataBus::new(Board::data_lines(board)),
            Board::pin(board, Line::OutputEnable),
            Board::pin(board, Line::WriteEnable),
            SimDelay::new(board),
            config,
        )
    }

    pub fn now_us(&self) -> u64 {
        self.now_ns / 1000
    }

    pub fn level(&self, line: Line) -> bool {
        self.levels[line.index()]
    }

    /// Address on the chip's address pins
    pub fn latched(&self) -> u16 {
        self.latched
    }

    /// Rising edges on the shift clock
    pub fn shift_clocks(&self) -> usize {
        self.shift_clocks
    }

    /// Rising edges on the latch line
    pub fn latch_pulses(&self) -> usize {
        self.latch_pulses
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Output register levels of D0..D7
    pub fn driven_bus_levels(&self) -> [bool; DATA_BUS_WIDTH] {
        self.bus_out_level
    }

    /// Output enable of D0..D7
    pub fn bus_outputs(&self) -> [bool; DATA_BUS_WIDTH] {
        self.bus_output
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Number of times both the chip and the programmer drove the data bus
    pub fn contention(&self) -> usize {
        self.contention
    }

    /// A stuck chip ignores program commands
    pub fn set_stuck(&mut self, stuck: bool) {
        self.stuck = stuck;
    }

    pub fn set_program_time_us(&mut self, program_time_us: u64) {
        self.program_time_ns = program_time_us * 1000;
    }

    fn advance(&mut self, ns: u64) {
        self.now_ns += ns;
        self.settle();
    }

    fn settle(&mut self) {
        if let Some(pending) = self.pending {
            if self.now_ns >= pending.ready_at_ns {
                let index = self.memory_index(pending.address);
                self.memory[index] = pending.value;
                self.pending = None;
            }
        }
    }

    fn memory_index(&self, address: u16) -> usize {
        address as usize % self.memory.len()
    }

    fn chip_drives_bus(&self) -> bool {
        self.attached && !self.level(Line::OutputEnable) && self.level(Line::WriteEnable)
    }

    fn chip_output(&self) -> u8 {
        match self.pending {
            Some(pending) => (!pending.value & 0x80) | (pending.value & 0x7f),
            None => self.memory[self.memory_index(self.latched)],
        }
    }

    fn wire_byte(&self) -> u8 {
        self.bus_wire
            .iter()
            .enumerate()
            .fold(0u8, |acc, (bit, &high)| acc | ((high as u8) << bit))
    }

    fn check_contention(&mut self) {
        if self.chip_drives_bus() && self.bus_output.iter().any(|&output| output) {
            self.contention += 1;
        }
    }

    fn set_line(&mut self, line: Line, level: bool) {
        if self.levels[line.index()] == level {
            return;
        }
        self.levels[line.index()] = level;
        self.events.push(Event::Line(line, level));

        match (line, level) {
            (Line::Clock, true) => {
                self.shift = (self.shift << 1) | self.level(Line::Data) as u16;
                self.shift_clocks += 1;
            }
            (Line::Latch, true) => {
                self.latched = self.shift;
                self.latch_pulses += 1;
                self.events.push(Event::Latched(self.latched));
            }
            (Line::WriteEnable, true) if self.attached && !self.stuck => {
                let pending = PendingWrite {
                    address: self.latched,
                    value: self.wire_byte(),
                    ready_at_ns: self.now_ns + self.program_time_ns,
                };
                self.events
                    .push(Event::Programmed(pending.address, pending.value));
                self.pending = Some(pending);
            }
            _ => {}
        }
        self.check_contention();
    }

    fn set_bus_level(&mut self, index: usize, level: bool) {
        self.bus_out_level[index] = level;
        if self.bus_output[index] {
            self.bus_wire[index] = level;
        }
    }

    fn set_bus_output(&mut self, index: usize, output: bool) {
        self.bus_output[index] = output;
        if output {
            self.bus_wire[index] = self.bus_out_level[index];
        }
        self.check_contention();
    }

    fn read_bus(&mut self, index: usize) -> bool {
        if !self.bus_output[index] && self.chip_drives_bus() {
            self.bus_wire[index] = (self.chip_output() >> index) & 1 == 1;
        }
        self.bus_wire[index]
    }
}

/// Board line as a GPIO
pub struct SimPin {
    board: Rc<RefCell<Board>>,
    line: Line,
}

impl ErrorType for SimPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.board.borrow_mut().set_line(self.line, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.board.borrow_mut().set_line(self.line, true);
        Ok(())
    }
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.board.borrow().level(self.line))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.board.borrow().level(self.line))
    }
}

/// Data bus wire as a bidirectional GPIO
pub struct SimDataLine {
    board: Rc<RefCell<Board>>,
    index: usize,
}

impl ErrorType for SimDataLine {
    type Error = core::convert::Infallible;
}

impl OutputPin for SimDataLine {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.board.borrow_mut().set_bus_level(self.index, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.board.borrow_mut().set_bus_level(self.index, true);
        Ok(())
    }
}

impl InputPin for SimDataLine {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.board.borrow_mut().read_bus(self.index))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.board.borrow_mut().read_bus(self.index))
    }
}

impl DataLine for SimDataLine {
    fn set_as_input(&mut self) -> Result<(), Self::Error> {
        self.board.borrow_mut().set_bus_output(self.index, false);
        Ok(())
    }

    fn set_as_output(&mut self) -> Result<(), Self::Error> {
        self.board.borrow_mut().set_bus_output(self.index, true);
        Ok(())
    }
}

/// Delay that advances board time instead of sleeping
pub struct SimDelay {
    board: Rc<RefCell<Board>>,
}

impl SimDelay {
    pub fn new(board: &Rc<RefCell<Board>>) -> Self {
        Self {
            board: Rc::clone(board),
        }
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.board.borrow_mut().advance(ns as u64);
    }
}

#[derive(Debug)]
pub struct PinFault;

impl digital::Error for PinFault {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Output pin that fails every operation
pub struct FaultyPin;

impl ErrorType for FaultyPin {
    type Error = PinFault;
}

impl OutputPin for FaultyPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Err(PinFault)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Err(PinFault)
    }
}

/// Output pin that can be driven high but fails to go low
pub struct HighOnlyPin(SimPin);

impl HighOnlyPin {
    pub fn new(pin: SimPin) -> Self {
        Self(pin)
    }
}

impl ErrorType for HighOnlyPin {
    type Error = PinFault;
}

impl OutputPin for HighOnlyPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Err(PinFault)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set_high().map_err(|never| match never {})
    }
}
