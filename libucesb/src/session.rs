//! A processing session: the three mirrors of one event layout with everything
//! resolved at setup.
//!
//! A session is owned by one thread. Its registry and tables are built in
//! [`Session::new`] and read-only afterwards; the mirrors are cleaned and refilled for
//! every event.
use super::calibration::{CalibRule, CalibSink, CalibTable};
use super::correlation::{CorrelationList, CorrelationMatrix};
use super::error::{SessionError, UnpackError};
use super::event_file::EventRecord;
use super::mapping::{MapRule, MapSink, MappingTable};
use super::members::{Members, PrettyPrinter};
use super::signal_id::SignalId;
use super::signal_map::SignalNames;
use super::watch::Watcher;
use super::zero_suppress_info::{Level, ZeroSuppressRegistry, ZzpWalk};

/// The unpacker of an experiment layout, with the types of its three mirrors
pub trait EventLayout {
    type Unpack: Members + Default + 'static;
    type Raw: Members + Default + 'static;
    type Cal: Members + Default + 'static;

    fn name(&self) -> &'static str;

    /// Decode one record into the unpack mirror. Returns the number of triggers
    /// (sub-events) the record holds.
    fn unpack(&mut self, record: &EventRecord, unpack: &mut Self::Unpack) -> Result<usize, UnpackError>;

    /// Make the unpack mirror show sub-event `event` of the last record
    fn select_event(&mut self, event: usize, unpack: &mut Self::Unpack) -> Result<(), UnpackError>;
}

/// What a session does with each event besides mapping and calibration
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub mapping: Vec<MapRule>,
    pub calibration: Vec<CalibRule>,
    pub watch: bool,
    /// Cal signal prefixes to correlate; empty disables correlation
    pub correlate: Vec<String>,
    /// Number of leading events whose cal level is dumped to the log
    pub dump_events: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub records: u64,
    pub events: u64,
}

pub struct Session<E: EventLayout> {
    layout: E,
    unpack: E::Unpack,
    raw: E::Raw,
    cal: E::Cal,
    registry: ZeroSuppressRegistry,
    unpack_names: SignalNames,
    raw_names: SignalNames,
    cal_names: SignalNames,
    mapping: MappingTable,
    calib: CalibTable,
    watcher: Option<Watcher>,
    correlation: Option<(CorrelationList, CorrelationMatrix)>,
    dump_events: u64,
    stats: SessionStats,
}

impl<E: EventLayout> Session<E> {
    pub fn new(layout: E, options: &SessionOptions) -> Result<Self, SessionError> {
        let unpack = E::Unpack::default();
        let raw = E::Raw::default();
        let cal = E::Cal::default();

        let mut registry = ZeroSuppressRegistry::new();
        unpack.zero_suppress_info_ptrs(&mut ZzpWalk::new(Level::Unpack, &mut registry))?;
        raw.zero_suppress_info_ptrs(&mut ZzpWalk::new(Level::Raw, &mut registry))?;
        cal.zero_suppress_info_ptrs(&mut ZzpWalk::new(Level::Cal, &mut registry))?;

        let unpack_names = SignalNames::build(Level::Unpack, &unpack);
        let raw_names = SignalNames::build(Level::Raw, &raw);
        let cal_names = SignalNames::build(Level::Cal, &cal);

        let mapping = MappingTable::build(&unpack_names, &raw_names, &registry, &options.mapping)?;
        let calib = CalibTable::build(&raw_names, &cal_names, &registry, &options.calibration)?;

        let watcher = options.watch.then(|| Watcher::new(cal_names.len()));
        let correlation = if options.correlate.is_empty() {
            None
        } else {
            Some((
                CorrelationList::new(cal_names.len()),
                CorrelationMatrix::new(&cal_names, &options.correlate)?,
            ))
        };

        spdlog::info!(
            "Session for layout {}: {} unpack, {} raw and {} cal leaves, {} registered, {} raw and {} cal zero-suppressed",
            layout.name(),
            unpack_names.len(),
            raw_names.len(),
            cal_names.len(),
            registry.len(),
            registry.count_zero_suppressed(Level::Raw),
            registry.count_zero_suppressed(Level::Cal)
        );

        Ok(Self {
            layout,
            unpack,
            raw,
            cal,
            registry,
            unpack_names,
            raw_names,
            cal_names,
            mapping,
            calib,
            watcher,
            correlation,
            dump_events: options.dump_events,
            stats: SessionStats::default(),
        })
    }

    /// Unpack a record and run every sub-event through mapping, calibration and the
    /// enabled instrumentation. Returns the number of sub-events.
    pub fn process_record(&mut self, record: &EventRecord) -> Result<usize, SessionError> {
        let first_event = record.event_number as u64;
        self.unpack.clean();
        let events = self
            .layout
            .unpack(record, &mut self.unpack)
            .map_err(|source| SessionError::UnpackError {
                event: first_event,
                source,
            })?;
        for sub in 0..events {
            self.process_event(sub)
                .map_err(|source| SessionError::UnpackError {
                    event: first_event + sub as u64,
                    source,
                })?;
            if self.stats.events < self.dump_events {
                spdlog::info!(
                    "Event {}:\n{}",
                    first_event + sub as u64,
                    self.dump(Level::Cal)
                );
            }
            self.stats.events += 1;
        }
        self.stats.records += 1;
        Ok(events)
    }

    fn process_event(&mut self, sub: usize) -> Result<(), UnpackError> {
        self.layout.select_event(sub, &mut self.unpack)?;
        self.raw.clean();
        self.cal.clean();
        self.unpack
            .map_members(&mut MapSink::new(&self.mapping, &mut self.raw))?;
        self.raw
            .calib_members(&mut CalibSink::new(&self.calib, &mut self.cal))?;
        if let Some(watcher) = self.watcher.as_mut() {
            watcher.begin_event();
            self.cal.watch_members(watcher)?;
        }
        if let Some((list, matrix)) = self.correlation.as_mut() {
            list.clear();
            self.cal.add_corr_members(list)?;
            matrix.accumulate(list);
        }
        Ok(())
    }

    fn mirror(&self, level: Level) -> &dyn Members {
        match level {
            Level::Unpack => &self.unpack,
            Level::Raw => &self.raw,
            Level::Cal => &self.cal,
        }
    }

    /// The valid leaves of a mirror with their values
    pub fn dump(&self, level: Level) -> String {
        let mut pp = PrettyPrinter::new();
        self.mirror(level).dump(&SignalId::new(), &mut pp);
        pp.finish()
    }

    /// The static shape of a mirror
    pub fn show(&self, level: Level) -> String {
        let mut pp = PrettyPrinter::new();
        self.mirror(level)
            .show_members(&SignalId::new(), None, &mut pp);
        pp.finish()
    }

    pub fn names(&self, level: Level) -> &SignalNames {
        match level {
            Level::Unpack => &self.unpack_names,
            Level::Raw => &self.raw_names,
            Level::Cal => &self.cal_names,
        }
    }

    pub fn layout(&self) -> &E {
        &self.layout
    }

    pub fn unpack_level(&self) -> &E::Unpack {
        &self.unpack
    }

    pub fn raw_level(&self) -> &E::Raw {
        &self.raw
    }

    pub fn cal_level(&self) -> &E::Cal {
        &self.cal
    }

    pub fn registry(&self) -> &ZeroSuppressRegistry {
        &self.registry
    }

    pub fn mapping(&self) -> &MappingTable {
        &self.mapping
    }

    pub fn watcher(&self) -> Option<&Watcher> {
        self.watcher.as_ref()
    }

    pub fn correlation(&self) -> Option<&CorrelationMatrix> {
        self.correlation.as_ref().map(|(_, matrix)| matrix)
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibParam;
    use crate::detectors::ext_sst::{SstData, SstHeader};
    use crate::detectors::vme_tdc::{TdcHeader, TdcHit};
    use crate::detectors::{DemoLayout, MultiEventMode};
    use crate::error::RegistryError;
    use crate::list_ii_zero_suppress::RawListIiZeroSuppress;
    use crate::zero_suppress::RawArrayZeroSuppress;

    fn demo_options() -> SessionOptions {
        SessionOptions {
            calibration: vec![
                CalibRule {
                    src: "SST[0].data".to_string(),
                    dest: "SST[0].E".to_string(),
                    param: CalibParam::Slope { slope: 2.0 },
                },
                CalibRule {
                    src: "TDC.hits".to_string(),
                    dest: "TDC.T".to_string(),
                    param: CalibParam::OffsetSlope {
                        offset: -1000.0,
                        slope: 0.5,
                    },
                },
            ],
            watch: true,
            correlate: vec!["SST[0].E".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_demo_session_end_to_end() {
        let mut session = Session::new(DemoLayout::new(MultiEventMode::Offset), &demo_options()).unwrap();
        let record = EventRecord {
            event_number: 40,
            triggers: 2,
            words: vec![
                SstHeader { module: 0, count: 3 }.encode(),
                SstData { channel: 700, adc: 5 }.encode(),
                SstData { channel: 12, adc: 9 }.encode(),
                SstData { channel: 300, adc: 1 }.encode(),
                TdcHeader { counter: 41, nhits: 2 }.encode(),
                TdcHit { channel: 4, time: 1010 }.encode(),
                TdcHit { channel: 4, time: 1020 }.encode(),
            ],
        };
        assert_eq!(session.process_record(&record).unwrap(), 2);
        assert_eq!(session.stats(), SessionStats { records: 1, events: 2 });

        // Second sub-event: no strips, TDC chunk with counter 41
        let raw = session.raw_level();
        assert!(raw.sst[0].data.is_empty());
        assert_eq!(raw.tdc.hits.entries(4), &[1010, 1020]);
        let cal = session.cal_level();
        assert_eq!(cal.tdc.t.entries(4), &[5.0, 10.0]);

        let watcher = session.watcher().unwrap();
        assert_eq!(watcher.events(), 2);
        let names = session.names(Level::Cal);
        let e700 = names.flat("SST[0].E[700]").unwrap();
        assert_eq!(watcher.count(e700), 1);
        let e12 = names.flat("SST[0].E[12]").unwrap();
        assert_eq!(session.correlation().unwrap().count(e12, e700), 1);
    }

    #[test]
    fn test_first_sub_event_mapping_through_list() {
        let mut session = Session::new(DemoLayout::default(), &demo_options()).unwrap();
        let record = EventRecord {
            event_number: 7,
            triggers: 1,
            words: vec![
                SstHeader { module: 1, count: 3 }.encode(),
                SstData { channel: 900, adc: 3 }.encode(),
                SstData { channel: 2, adc: 4 }.encode(),
                SstData { channel: 450, adc: 0 }.encode(),
            ],
        };
        session.process_record(&record).unwrap();
        // Raw SST is a sorted list, fed in ascending flat order
        let raw: Vec<(usize, u16)> = session.raw_level().sst[1]
            .data
            .iter()
            .map(|(ch, v)| (ch, *v))
            .collect();
        assert_eq!(raw, vec![(2, 4), (450, 0), (900, 3)]);
        // SST[1] has no rule, so it is copied by name: raw data -> nothing at cal
        assert!(session.cal_level().sst[1].e.is_empty());
        assert!(session.dump(Level::Raw).contains("SST[1].data[900]: 3"));
        assert!(session.show(Level::Cal).contains("SST[2].E[1024]: float [keV]"));
    }

    #[test]
    fn test_unpack_error_reports_event() {
        let mut session = Session::new(DemoLayout::default(), &SessionOptions::default()).unwrap();
        let record = EventRecord {
            event_number: 99,
            triggers: 1,
            words: vec![0xf000_0000],
        };
        match session.process_record(&record) {
            Err(SessionError::UnpackError { event, .. }) => assert_eq!(event, 99),
            other => panic!("expected unpack error, got {:?}", other.map(|_| ())),
        }
    }

    #[derive(Debug, Clone, Default)]
    struct Nested {
        outer: RawArrayZeroSuppress<RawListIiZeroSuppress<u16, 4>, 4>,
    }

    crate::impl_members!(Nested { outer: "OUTER" });

    struct NestedLayout;

    impl EventLayout for NestedLayout {
        type Unpack = Nested;
        type Raw = Nested;
        type Cal = Nested;

        fn name(&self) -> &'static str {
            "nested"
        }

        fn unpack(&mut self, _record: &EventRecord, _unpack: &mut Nested) -> Result<usize, UnpackError> {
            Ok(1)
        }

        fn select_event(&mut self, _event: usize, _unpack: &mut Nested) -> Result<(), UnpackError> {
            Ok(())
        }
    }

    #[test]
    fn test_nested_zero_suppression_rejected() {
        assert!(matches!(
            Session::new(NestedLayout, &SessionOptions::default()),
            Err(SessionError::RegistryError(RegistryError::NestedZeroSuppress { .. }))
        ));
    }
}
