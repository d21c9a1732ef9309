//! Test doubles that record everything the driver does into one shared log,
//! so tests can check the interleaving of bus, pin, register and delay
//! activity.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::vec::Vec;

use core::convert::Infallible;

use embassy_futures::block_on;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;

use crate::control::{DirectIo, Expander, RegisterIo};
use crate::transport::{BlockTransfer, ByteTransfer};
use crate::{Config, Ssd1331};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// Byte loaded into the transmit register.
    Load(u8),
    /// Completion poll.
    Poll,
    /// Expander register write.
    Register(u8, u8),
    /// Expander register read.
    Read(u8),
    /// Output pin set.
    Pin(&'static str, bool),
    /// Delay in nanoseconds.
    Delay(u32),
    DmaStart(usize),
    DmaWait,
}

/// Shared event list. Also carries the load budget of [MockBus], so a
/// test can make the bus of an already built driver fail.
#[derive(Clone, Default)]
pub struct Log {
    events: Rc<RefCell<Vec<Event>>>,
    loads_left: Rc<Cell<Option<usize>>>,
}

impl Log {
    pub fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    /// Returns and clears the events recorded so far.
    pub fn take(&self) -> Vec<Event> {
        core::mem::take(&mut *self.events.borrow_mut())
    }

    /// Lets `loads` more bytes through, then fails every load.
    pub fn fail_bus_after(&self, loads: usize) {
        self.loads_left.set(Some(loads));
    }
}

/// The bytes loaded onto the bus, in order.
pub fn loads(events: &[Event]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Load(b) => Some(*b),
            _ => None,
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusFault;

/// Bus whose transfers complete instantly, until its load budget runs out.
pub struct MockBus {
    log: Log,
}

impl MockBus {
    pub fn new(log: Log) -> Self {
        Self { log }
    }
}

impl ByteTransfer for MockBus {
    type Error = BusFault;

    async fn load(&mut self, byte: u8) -> Result<(), BusFault> {
        self.log.push(Event::Load(byte));
        match self.log.loads_left.get() {
            Some(0) => Err(BusFault),
            Some(n) => {
                self.log.loads_left.set(Some(n - 1));
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn transfer_complete(&mut self) -> Result<bool, BusFault> {
        self.log.push(Event::Poll);
        Ok(true)
    }
}

/// Expander registers. Reads of the data register return `data`, reads of
/// the interrupt source return `interrupt_source`; writes only get logged.
pub struct MockRegisters {
    log: Log,
    pub data: u8,
    pub interrupt_source: u8,
}

impl MockRegisters {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            // Pull-ups high, nothing pressed.
            data: 0xFF,
            interrupt_source: 0,
        }
    }
}

impl RegisterIo for MockRegisters {
    type Error = Infallible;

    async fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Infallible> {
        self.log.push(Event::Register(reg, value));
        Ok(())
    }

    async fn read_register(&mut self, reg: u8) -> Result<u8, Infallible> {
        self.log.push(Event::Read(reg));
        Ok(match reg {
            crate::register::INTERRUPT_SOURCE => self.interrupt_source,
            _ => self.data,
        })
    }
}

/// Output pins log their writes. Input pins share their level with their
/// clones, so a test can keep a handle and press buttons.
#[derive(Clone)]
pub struct MockPin {
    name: &'static str,
    log: Option<Log>,
    level: Rc<Cell<bool>>,
}

impl MockPin {
    pub fn output(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: Some(log.clone()),
            level: Rc::new(Cell::new(false)),
        }
    }

    pub fn input() -> Self {
        Self {
            name: "button",
            log: None,
            level: Rc::new(Cell::new(true)),
        }
    }

    pub fn set_level(&self, high: bool) {
        self.level.set(high);
    }

    fn set(&mut self, high: bool) {
        self.level.set(high);
        if let Some(log) = &self.log {
            log.push(Event::Pin(self.name, high));
        }
    }
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.set(true);
        Ok(())
    }
}

impl InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.level.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.level.get())
    }
}

pub struct MockDelay {
    log: Log,
}

impl MockDelay {
    pub fn new(log: Log) -> Self {
        Self { log }
    }
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.log.push(Event::Delay(ns));
    }
}

/// DMA engine whose transfers finish when waited for.
pub struct MockDma {
    log: Log,
    ready: bool,
}

impl MockDma {
    pub fn new(log: Log) -> Self {
        Self { log, ready: true }
    }
}

impl BlockTransfer for MockDma {
    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn wait_ready(&mut self) {
        if !self.ready {
            self.log.push(Event::DmaWait);
            self.ready = true;
        }
    }

    fn start(&mut self, data: &'static [u8]) {
        self.log.push(Event::DmaStart(data.len()));
        self.ready = false;
    }
}

pub type MockExpanderDisplay = Ssd1331<MockBus, Expander<MockRegisters>, MockDelay>;

pub type MockDirectIoDisplay =
    Ssd1331<MockBus, DirectIo<MockPin, MockPin, MockPin, MockPin, MockPin>, MockDelay>;

/// Initialized driver on an expander, with the init traffic cleared from
/// the log.
pub fn expander_display(config: Config) -> (MockExpanderDisplay, Log) {
    let log = Log::default();
    let display = block_on(Ssd1331::new(
        config,
        MockBus::new(log.clone()),
        Expander::new(MockRegisters::new(log.clone())),
        MockDelay::new(log.clone()),
    ))
    .unwrap();
    log.take();
    (display, log)
}

/// Initialized driver on direct pins, with handles to the four button
/// inputs.
pub fn direct_io_display(config: Config) -> (MockDirectIoDisplay, Log, [MockPin; 4]) {
    let log = Log::default();
    let buttons = [
        MockPin::input(),
        MockPin::input(),
        MockPin::input(),
        MockPin::input(),
    ];
    let handles = buttons.clone();
    let lines = DirectIo::new(
        MockPin::output("dc", &log),
        MockPin::output("cs", &log),
        MockPin::output("shdn", &log),
        MockPin::output("rst", &log),
        buttons,
    );
    let display = block_on(Ssd1331::new(
        config,
        MockBus::new(log.clone()),
        lines,
        MockDelay::new(log.clone()),
    ))
    .unwrap();
    log.take();
    (display, log, handles)
}
