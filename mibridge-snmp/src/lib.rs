//! SNMP polling bridge.
//!
//! Each configured target gets its own worker: it opens an SNMP session,
//! reads a fixed list of OIDs, decodes the values according to the target's
//! device class and publishes the record as JSON to a broker topic.
//!
//! # Payloads
//!
//! ```text
//! interfaces   {"Intf1":"up","Intf2":"down","Intf3":"up"}
//! temperature  {"Celcius":250,"Fahrenheit":770,"Label":"SensorA"}
//! ```

pub mod config;
pub mod decoder;
pub mod oid;
pub mod sample;
pub mod session;
pub mod worker;

pub use config::{ConnectPolicy, ExhaustionPolicy, SnmpBridgeConfig, SnmpVersion, TargetConfig};
pub use decoder::{DecodeError, DecodedRecord, DeviceClass, InterfaceRecord, TemperatureRecord};
pub use sample::{RawSample, SampleValue, Varbind};
pub use session::{SampleReader, SessionError, SnmpSession};
pub use worker::{PollWorker, TickOutcome, WorkerStats, run_target};
