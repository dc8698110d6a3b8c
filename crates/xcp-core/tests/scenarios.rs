//! End-to-end sessions driven through raw request frames.

use std::sync::Arc;

use xcp_core::protocol::constants::*;
use xcp_core::{
    FixedClock, MockTransport, PgmState, RamMemory, RecordingObserver, Resource, SecurityConfig,
    SimFlash, SlaveConfig, XcpEvent, XcpSlave, compute_key,
};

type Slave = XcpSlave<MockTransport, RamMemory, SimFlash, RecordingObserver>;

struct Bench {
    slave: Slave,
    bus: MockTransport,
    observer: Arc<RecordingObserver>,
}

impl Bench {
    fn new(config: SlaveConfig) -> Self {
        let bus = MockTransport::new();
        let observer = Arc::new(RecordingObserver::new());
        let slave = XcpSlave::with_observer(
            bus.clone(),
            config.build_memory().unwrap(),
            config.build_flash(),
            &config,
            observer.clone(),
        )
        .with_clock(FixedClock::new(0));
        Self {
            slave,
            bus,
            observer,
        }
    }

    fn connected(config: SlaveConfig) -> Self {
        let mut bench = Self::new(config);
        assert_eq!(bench.send(&[CMD_CONNECT, 0x00])[0], PID_RES);
        bench
    }

    /// Send one request and return the single reply it produced.
    fn send(&mut self, frame: &[u8]) -> Vec<u8> {
        let before = self.bus.get_sent().len();
        self.slave.process(frame).unwrap();
        let sent = self.bus.get_sent();
        assert_eq!(sent.len(), before + 1, "exactly one reply per request");
        sent[before].clone()
    }
}

fn set_mta(address: u32) -> Vec<u8> {
    let mut frame = vec![CMD_SET_MTA, 0, 0, 0];
    frame.extend_from_slice(&address.to_be_bytes());
    frame
}

fn program(data: &[u8]) -> Vec<u8> {
    let mut frame = vec![CMD_PROGRAM, data.len() as u8];
    frame.extend_from_slice(data);
    frame
}

fn unlock(key: &[u8]) -> Vec<u8> {
    let mut frame = vec![CMD_UNLOCK, key.len() as u8];
    frame.extend_from_slice(key);
    frame
}

fn secured() -> SlaveConfig {
    let mut config = SlaveConfig::default();
    config.security = SecurityConfig {
        enabled: true,
        secret_key: 0x1234_5678,
        rng_seed: Some(0x5EED),
        ..Default::default()
    };
    config
}

#[test]
fn calibration_download_and_upload() {
    let mut b = Bench::connected(SlaveConfig::default());

    assert_eq!(b.send(&set_mta(0x0100)), vec![PID_RES]);
    assert_eq!(
        b.send(&[CMD_DOWNLOAD, 4, 0xAA, 0xBB, 0xCC, 0xDD]),
        vec![PID_RES]
    );
    assert_eq!(b.send(&set_mta(0x0100)), vec![PID_RES]);
    assert_eq!(
        b.send(&[CMD_UPLOAD, 4]),
        vec![PID_RES, 0xAA, 0xBB, 0xCC, 0xDD]
    );
}

#[test]
fn flash_programming_sequence() {
    let mut b = Bench::connected(SlaveConfig::default());

    assert_eq!(b.send(&[CMD_PROGRAM_START])[0], PID_RES);
    assert_eq!(b.send(&set_mta(0x0100)), vec![PID_RES]);
    assert_eq!(
        b.send(&[CMD_PROGRAM_CLEAR, 0, 0, 0, 0x00, 0x00, 0x01, 0x00]),
        vec![PID_RES]
    );
    assert_eq!(b.send(&program(&[0x01, 0x02, 0x03, 0x04])), vec![PID_RES]);
    assert_eq!(b.send(&program(&[0x05, 0x06, 0x07, 0x08])), vec![PID_RES]);
    assert_eq!(b.send(&program(&[])), vec![PID_RES]);

    let expected = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
    assert_eq!(b.slave.flash().slice(0x0100, 8), Some(&expected[..]));
    assert_eq!(&b.slave.memory().contents()[0x0100..0x0108], &expected);
    assert_eq!(b.slave.state().program.state(), PgmState::Idle);

    // The programmed bytes read back over the protocol as well.
    b.send(&set_mta(0x0100));
    assert_eq!(
        b.send(&[CMD_UPLOAD, 7]),
        vec![PID_RES, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07]
    );

    let transitions: Vec<_> = b
        .observer
        .events()
        .into_iter()
        .filter_map(|e| match e {
            XcpEvent::ProgramStateChanged { to, .. } => Some(to),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            PgmState::Started,
            PgmState::Cleared,
            PgmState::Programming,
            PgmState::Idle
        ]
    );
}

#[test]
fn programming_out_of_order() {
    let mut b = Bench::connected(SlaveConfig::default());

    assert_eq!(b.send(&program(&[1])), vec![PID_ERR, ERR_SEQUENCE]);
    assert_eq!(
        b.send(&[CMD_PROGRAM_CLEAR, 0, 0, 0, 0, 0, 0, 0x10]),
        vec![PID_ERR, ERR_SEQUENCE]
    );
    assert_eq!(b.send(&[CMD_PROGRAM_START])[0], PID_RES);
    assert_eq!(b.send(&[CMD_PROGRAM_START]), vec![PID_ERR, ERR_PGM_ACTIVE]);
}

#[test]
fn seed_and_key_unlock() {
    let mut b = Bench::connected(secured());

    let seed = b.send(&[CMD_GET_SEED, 0]);
    assert_eq!(seed[0], PID_RES);
    assert_eq!(seed[1], 4);
    let seed = &seed[2..6];

    let key = compute_key(seed, 0x1234_5678);
    assert_eq!(b.send(&unlock(&key)), vec![PID_RES]);
    assert!(b.slave.security().is_unlocked(Resource::CalPag));
    assert!(!b.slave.security().is_unlocked(Resource::Pgm));

    // A fresh challenge for PGM refuses an all-zero key.
    assert_eq!(b.send(&[CMD_GET_SEED, 3])[1], 4);
    assert_eq!(
        b.send(&unlock(&[0, 0, 0, 0])),
        vec![PID_ERR, ERR_ACCESS_LOCKED]
    );
    assert!(!b.slave.security().is_unlocked(Resource::Pgm));
    assert!(b.slave.security().is_unlocked(Resource::CalPag));
}

#[test]
fn locked_calibration_rejects_download() {
    let mut b = Bench::connected(secured());
    b.send(&set_mta(0x0100));
    assert_eq!(
        b.send(&[CMD_DOWNLOAD, 1, 0x55]),
        vec![PID_ERR, ERR_ACCESS_LOCKED]
    );
    assert_eq!(b.slave.memory().contents()[0x0100], 0x00);

    // GET_STATUS reports CAL_PAG and PGM as protected.
    assert_eq!(
        b.send(&[CMD_GET_STATUS]),
        vec![PID_RES, 0x00, RESOURCE_CAL_PAG | RESOURCE_PGM, 0, 0, 0]
    );
}

#[test]
fn daq_allocation_then_bad_sector() {
    let mut b = Bench::connected(SlaveConfig::default());

    assert_eq!(b.send(&[CMD_ALLOC_DAQ, 0, 0x00, 0x02]), vec![PID_RES]);
    assert_eq!(b.send(&[CMD_ALLOC_ODT, 0, 0x00, 0x00, 3]), vec![PID_RES]);
    assert_eq!(
        b.send(&[CMD_ALLOC_ODT_ENTRY, 0, 0x00, 0x00, 0, 3]),
        vec![PID_RES]
    );
    assert_eq!(
        b.send(&[CMD_GET_SECTOR_INFO, 0, 99]),
        vec![PID_ERR, ERR_OUT_OF_RANGE]
    );
}

#[test]
fn daq_measurement_cycle() {
    let mut b = Bench::connected(SlaveConfig::default());
    b.send(&set_mta(0x0020));
    b.send(&[CMD_DOWNLOAD, 4, 0x11, 0x22, 0x33, 0x44]);

    for frame in [
        &[CMD_FREE_DAQ][..],
        &[CMD_ALLOC_DAQ, 0, 0, 1],
        &[CMD_ALLOC_ODT, 0, 0, 0, 1],
        &[CMD_ALLOC_ODT_ENTRY, 0, 0, 0, 0, 2],
        &[CMD_SET_DAQ_PTR, 0, 0, 0, 0, 0],
        &[CMD_WRITE_DAQ, 0xFF, 2, 0, 0, 0, 0, 0x20],
        &[CMD_WRITE_DAQ, 0xFF, 2, 0, 0, 0, 0, 0x22],
        &[CMD_SET_DAQ_LIST_MODE, 0, 0, 0, 0, 0, 1, 0],
    ] {
        assert_eq!(b.send(frame), vec![PID_RES]);
    }
    assert_eq!(b.send(&[CMD_START_STOP_DAQ_LIST, 2, 0, 0]), vec![PID_RES, 0]);
    assert_eq!(b.send(&[CMD_START_STOP_SYNCH, 1]), vec![PID_RES]);
    b.bus.clear_sent();

    assert_eq!(b.slave.emit_daq(0).unwrap(), 1);
    assert_eq!(b.bus.get_sent(), vec![vec![0x00, 0x11, 0x22, 0x33, 0x44]]);

    assert_eq!(b.send(&[CMD_DISCONNECT]), vec![PID_RES]);
    b.bus.clear_sent();
    assert_eq!(b.slave.emit_daq(0).unwrap(), 0);
    assert!(b.bus.get_sent().is_empty());
}

#[test]
fn commands_before_connect_are_rejected() {
    let mut b = Bench::new(SlaveConfig::default());
    assert_eq!(b.send(&[CMD_UPLOAD, 1]), vec![PID_ERR, ERR_SEQUENCE]);
    assert_eq!(b.send(&[CMD_PROGRAM_START]), vec![PID_ERR, ERR_SEQUENCE]);
    assert!(!b.slave.is_connected());
}
