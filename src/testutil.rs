//! Shared fakes for unit and scenario tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::common::anomaly::AnomalyReporter;
use crate::common::messagerouter::{MessageQueue, MessageRouter};
use crate::common::result::{RadioError, ServiceState};
use crate::common::stack_time::StackTime;
use crate::common::stats::{OutgoingSmsReport, SmsStatsSink};
use crate::common::tracker::{AppIdentity, SentCallback, SmsFormat, SmsTracker};
use crate::config::{self, StackConfig};
use crate::entities::dispatch::{DispatchDeps, SmsDispatchEntity};
use crate::entities::StackEntityTrait;
use crate::gateway::{event_channel, CarrierEvents, StackEvent, StackHandle};
use crate::platform::carrier::{CarrierMessagingService, CarrierServiceLookup};
use crate::platform::encoder::{ConcatHeader, SmsEncoder, SubmitPdu};
use crate::platform::info::PlatformInfo;
use crate::platform::stores::{
    MessageStore, MessageType, SentRecord, SimRecords, StoreError, StoreHandle,
    SubscriptionStore, TPMR_NOT_SET,
};
use crate::platform::usage::{PremiumPermission, ShortCodeCategory, UsageMonitor};
use crate::saps::rsub::{RsubSubmitCnf, SmsAck};
use crate::saps::sapmsg::{Sap, SapMsg, SapMsgInner, StackEntity};

pub const SUB_ID: i32 = 1;

pub fn app() -> AppIdentity {
    AppIdentity { package: "com.example.msg".into(), user_id: 0 }
}

pub fn tracker_for_test(dest: &str, sent_cb: SentCallback) -> SmsTracker {
    SmsTracker {
        dest_addr: dest.to_string(),
        sc_addr: None,
        pdu: vec![0x01, 0x02],
        smsc: None,
        sent_cb,
        delivery_cb: None,
        retry_count: 0,
        max_retry_count: 3,
        message_ref: 1,
        priority: None,
        validity_period_mins: None,
        format: SmsFormat::ThreeGpp,
        message_id: 0,
        unique_message_id: 0,
        multipart: None,
        store_handle: None,
        skip_short_code_check: false,
        is_for_vvm: false,
        from_default_app: None,
        carrier_attempts: 0,
        carrier_status: None,
        submitted_at: StackTime::default(),
        expect_more: false,
        is_text: true,
        full_text: Some("hello".into()),
        persist: true,
        app: app(),
        sub_id: SUB_ID,
        trace: None,
    }
}

// ---- stores ------------------------------------------------------------

#[derive(Clone)]
pub struct FakeSimRecords {
    inner: Arc<Mutex<SimInner>>,
}

struct SimInner {
    value: i32,
    fail: bool,
}

impl FakeSimRecords {
    pub fn with_value(value: i32) -> Self {
        Self { inner: Arc::new(Mutex::new(SimInner { value, fail: false })) }
    }

    pub fn unset() -> Self {
        Self::with_value(TPMR_NOT_SET)
    }

    pub fn failing() -> Self {
        Self { inner: Arc::new(Mutex::new(SimInner { value: TPMR_NOT_SET, fail: true })) }
    }
}

impl SimRecords for FakeSimRecords {
    fn tpmr(&self) -> Result<i32, StoreError> {
        let inner = self.inner.lock().unwrap();
        if inner.fail {
            return Err(StoreError("sim read failed".into()));
        }
        Ok(inner.value)
    }

    fn set_tpmr(&mut self, value: i32) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail {
            return Err(StoreError("sim write failed".into()));
        }
        inner.value = value;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FakeSubscriptionStore {
    inner: Arc<Mutex<HashMap<i32, i32>>>,
}

impl SubscriptionStore for FakeSubscriptionStore {
    fn last_tpmr(&self, sub_id: i32) -> Result<i32, StoreError> {
        Ok(*self.inner.lock().unwrap().get(&sub_id).unwrap_or(&TPMR_NOT_SET))
    }

    fn set_last_tpmr(&mut self, sub_id: i32, value: i32) -> Result<(), StoreError> {
        self.inner.lock().unwrap().insert(sub_id, value);
        Ok(())
    }
}

#[derive(Clone)]
pub struct StoredRecord {
    pub handle: StoreHandle,
    pub record: SentRecord,
    pub msg_type: MessageType,
    pub error_code: Option<i32>,
    pub delivery_status: Option<u8>,
}

#[derive(Clone, Default)]
pub struct FakeMessageStore {
    inner: Arc<Mutex<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    next: u64,
    records: Vec<StoredRecord>,
}

impl MessageStore for FakeMessageStore {
    fn insert(&mut self, record: SentRecord) -> Option<StoreHandle> {
        let mut inner = self.inner.lock().unwrap();
        inner.next += 1;
        let handle = StoreHandle(inner.next);
        let msg_type = record.msg_type;
        let error_code = record.error_code;
        inner.records.push(StoredRecord {
            handle,
            record,
            msg_type,
            error_code,
            delivery_status: None,
        });
        Some(handle)
    }

    fn update(&mut self, handle: StoreHandle, msg_type: MessageType, error_code: Option<i32>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(r) = inner.records.iter_mut().find(|r| r.handle == handle) {
            r.msg_type = msg_type;
            r.error_code = error_code;
        }
    }

    fn set_delivery_status(&mut self, handle: StoreHandle, status: u8) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(r) = inner.records.iter_mut().find(|r| r.handle == handle) {
            r.delivery_status = Some(status);
        }
    }
}

impl FakeMessageStore {
    pub fn inserts(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    pub fn last_type(&self) -> Option<MessageType> {
        self.inner.lock().unwrap().records.last().map(|r| r.msg_type)
    }

    pub fn records(&self) -> Vec<StoredRecord> {
        self.inner.lock().unwrap().records.clone()
    }
}

// ---- platform ----------------------------------------------------------

#[derive(Clone)]
pub struct FakePlatform {
    pub service: ServiceState,
    pub sim_iso: Option<String>,
    pub network_iso: Option<String>,
    pub provisioned: bool,
    pub ecbm: bool,
    pub default_sms_app: bool,
    pub privileged: bool,
    pub known_apps: bool,
    pub emergency_numbers: Vec<String>,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self {
            service: ServiceState::InService,
            sim_iso: Some("us".into()),
            network_iso: Some("us".into()),
            provisioned: true,
            ecbm: false,
            default_sms_app: false,
            privileged: false,
            known_apps: true,
            emergency_numbers: vec!["911".into()],
        }
    }
}

impl PlatformInfo for FakePlatform {
    fn service_state(&self) -> ServiceState {
        self.service
    }

    fn sim_country_iso(&self) -> Option<String> {
        self.sim_iso.clone()
    }

    fn network_country_iso(&self) -> Option<String> {
        self.network_iso.clone()
    }

    fn is_emergency_number(&self, addr: &str) -> bool {
        self.emergency_numbers.iter().any(|n| n == addr)
    }

    fn device_provisioned(&self) -> bool {
        self.provisioned
    }

    fn in_emergency_callback_mode(&self) -> bool {
        self.ecbm
    }

    fn is_default_sms_app(&self, _package: &str) -> bool {
        self.default_sms_app
    }

    fn has_unconfirmed_send_privilege(&self, _package: &str) -> bool {
        self.privileged
    }

    fn app_known(&self, _package: &str, _user_id: i32) -> bool {
        self.known_apps
    }
}

// ---- usage monitor -----------------------------------------------------

#[derive(Clone)]
pub struct FakeUsage {
    inner: Arc<Mutex<UsageInner>>,
}

struct UsageInner {
    categories: HashMap<String, ShortCodeCategory>,
    volume_ok: bool,
    permissions: HashMap<String, PremiumPermission>,
}

impl Default for FakeUsage {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(UsageInner {
                categories: HashMap::new(),
                volume_ok: true,
                permissions: HashMap::new(),
            })),
        }
    }
}

impl FakeUsage {
    pub fn classify(&self, dest_addr: &str, category: ShortCodeCategory) {
        self.inner.lock().unwrap().categories.insert(dest_addr.to_string(), category);
    }

    pub fn set_volume_ok(&self, ok: bool) {
        self.inner.lock().unwrap().volume_ok = ok;
    }

    pub fn permission_for(&self, package: &str) -> PremiumPermission {
        *self
            .inner
            .lock()
            .unwrap()
            .permissions
            .get(package)
            .unwrap_or(&PremiumPermission::Ask)
    }
}

impl UsageMonitor for FakeUsage {
    fn check_destination(&self, dest_addr: &str, _country_iso: &str) -> ShortCodeCategory {
        *self
            .inner
            .lock()
            .unwrap()
            .categories
            .get(dest_addr)
            .unwrap_or(&ShortCodeCategory::NotShortCode)
    }

    fn check_volume(&mut self, _package: &str, _count: usize) -> bool {
        self.inner.lock().unwrap().volume_ok
    }

    fn premium_permission(&self, package: &str) -> PremiumPermission {
        self.permission_for(package)
    }

    fn set_premium_permission(&mut self, package: &str, permission: PremiumPermission) {
        self.inner.lock().unwrap().permissions.insert(package.to_string(), permission);
    }
}

// ---- encoder -----------------------------------------------------------

#[derive(Clone, Default)]
pub struct FakeEncoder {
    pub fail: bool,
}

impl SmsEncoder for FakeEncoder {
    fn text_submit_pdu(
        &self,
        sc_addr: Option<&str>,
        _dest_addr: &str,
        text: &str,
        _status_report: bool,
        _concat: Option<&ConcatHeader>,
        _priority: Option<u8>,
        _validity_period_mins: Option<u32>,
        message_ref: u8,
    ) -> Option<SubmitPdu> {
        if self.fail {
            return None;
        }
        let mut pdu = vec![message_ref];
        pdu.extend_from_slice(text.as_bytes());
        Some(SubmitPdu { smsc: sc_addr.map(|s| s.as_bytes().to_vec()), pdu })
    }

    fn data_submit_pdu(
        &self,
        sc_addr: Option<&str>,
        _dest_addr: &str,
        dest_port: u16,
        data: &[u8],
        _status_report: bool,
        message_ref: u8,
    ) -> Option<SubmitPdu> {
        if self.fail {
            return None;
        }
        let mut pdu = vec![message_ref, (dest_port >> 8) as u8, dest_port as u8];
        pdu.extend_from_slice(data);
        Some(SubmitPdu { smsc: sc_addr.map(|s| s.as_bytes().to_vec()), pdu })
    }

    fn segment_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        chars.chunks(10).map(|c| c.iter().collect()).collect()
    }
}

// ---- radio entity ------------------------------------------------------

#[derive(Clone)]
pub struct RadioSubmission {
    pub dest_addr: String,
    pub message_ref: u8,
    pub retry_count: u32,
}

#[derive(Clone, Default)]
pub struct RadioScript {
    inner: Arc<Mutex<RadioScriptInner>>,
}

#[derive(Default)]
struct RadioScriptInner {
    responses: VecDeque<Result<SmsAck, RadioError>>,
    submissions: Vec<RadioSubmission>,
}

impl RadioScript {
    pub fn push_response(&self, response: Result<SmsAck, RadioError>) {
        self.inner.lock().unwrap().responses.push_back(response);
    }

    pub fn push_failure(&self, failure: crate::common::result::RadioFailure) {
        self.push_response(Err(RadioError::new(failure)));
    }

    pub fn submissions(&self) -> Vec<RadioSubmission> {
        self.inner.lock().unwrap().submissions.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.inner.lock().unwrap().submissions.len()
    }
}

/// Scripted radio channel: answers each submission with the next scripted
/// response, or success when the script is exhausted.
pub struct FakeRadio {
    script: RadioScript,
}

impl FakeRadio {
    pub fn new(script: RadioScript) -> Self {
        Self { script }
    }
}

impl StackEntityTrait for FakeRadio {
    fn entity(&self) -> StackEntity {
        StackEntity::Radio
    }

    fn rx_prim(&mut self, queue: &mut MessageQueue, message: SapMsg) {
        if let SapMsgInner::RsubSubmitReq(req) = message.msg {
            let result = {
                let mut inner = self.script.inner.lock().unwrap();
                inner.submissions.push(RadioSubmission {
                    dest_addr: req.tracker.dest_addr.clone(),
                    message_ref: req.tracker.message_ref,
                    retry_count: req.tracker.retry_count,
                });
                inner.responses.pop_front().unwrap_or_else(|| {
                    Ok(SmsAck { message_ref: 0, ack_pdu: None, error_code: None })
                })
            };
            queue.push_back(SapMsg::new(
                Sap::Rsub,
                StackEntity::Radio,
                StackEntity::Dispatch,
                message.dltime,
                SapMsgInner::RsubSubmitCnf(RsubSubmitCnf { tracker: req.tracker, result }),
            ));
        }
    }
}

// ---- carrier service ---------------------------------------------------

#[derive(Clone)]
pub struct CarrierScript {
    pub bind_ok: bool,
    /// Status and per-part message refs to answer each send with; `None`
    /// never answers (timeout path).
    pub respond: Option<(i32, Vec<u32>)>,
    pub double_respond: bool,
}

impl Default for CarrierScript {
    fn default() -> Self {
        Self { bind_ok: true, respond: Some((0, Vec::new())), double_respond: false }
    }
}

#[derive(Clone, Default)]
pub struct CarrierLog {
    pub binds: usize,
    pub sends: Vec<String>,
    pub disconnects: usize,
}

#[derive(Clone)]
pub struct CarrierControl {
    installed: bool,
    script: CarrierScript,
    log: Arc<Mutex<CarrierLog>>,
}

impl CarrierControl {
    pub fn none() -> Self {
        Self { installed: false, script: CarrierScript::default(), log: Default::default() }
    }

    pub fn installed(script: CarrierScript) -> Self {
        Self { installed: true, script, log: Default::default() }
    }

    pub fn log(&self) -> CarrierLog {
        self.log.lock().unwrap().clone()
    }

    fn lookup(&self) -> FakeCarrierLookup {
        FakeCarrierLookup { control: self.clone() }
    }
}

pub struct FakeCarrierLookup {
    control: CarrierControl,
}

impl CarrierServiceLookup for FakeCarrierLookup {
    fn service_for_send(&mut self) -> Option<Box<dyn CarrierMessagingService>> {
        if !self.control.installed {
            return None;
        }
        Some(Box::new(FakeCarrierService {
            script: self.control.script.clone(),
            log: self.control.log.clone(),
        }))
    }
}

struct FakeCarrierService {
    script: CarrierScript,
    log: Arc<Mutex<CarrierLog>>,
}

impl FakeCarrierService {
    fn respond(&self, events: &CarrierEvents, multipart: bool) {
        let Some((status, refs)) = &self.script.respond else {
            return;
        };
        let times = if self.script.double_respond { 2 } else { 1 };
        for _ in 0..times {
            if multipart {
                events.multipart_send_complete(*status, refs.clone());
            } else {
                events.send_complete(*status, refs.first().copied().unwrap_or(0));
            }
        }
    }
}

impl CarrierMessagingService for FakeCarrierService {
    fn bind(&mut self, events: CarrierEvents) -> bool {
        self.log.lock().unwrap().binds += 1;
        if !self.script.bind_ok {
            return false;
        }
        events.service_ready();
        true
    }

    fn send_text_sms(
        &mut self,
        _text: &str,
        _sub_id: i32,
        _dest_addr: &str,
        _status_report: bool,
        events: CarrierEvents,
    ) {
        self.log.lock().unwrap().sends.push("text".into());
        self.respond(&events, false);
    }

    fn send_data_sms(
        &mut self,
        _data: &[u8],
        _sub_id: i32,
        _dest_addr: &str,
        _dest_port: u16,
        _status_report: bool,
        events: CarrierEvents,
    ) {
        self.log.lock().unwrap().sends.push("data".into());
        self.respond(&events, false);
    }

    fn send_multipart_text_sms(
        &mut self,
        _parts: &[String],
        _sub_id: i32,
        _dest_addr: &str,
        _status_report: bool,
        events: CarrierEvents,
    ) {
        self.log.lock().unwrap().sends.push("multipart".into());
        self.respond(&events, true);
    }

    fn disconnect(&mut self) {
        self.log.lock().unwrap().disconnects += 1;
    }
}

// ---- telemetry + anomalies ---------------------------------------------

#[derive(Clone, Default)]
pub struct RecordingAnomalies {
    inner: Arc<Mutex<Vec<(Uuid, String)>>>,
}

impl AnomalyReporter for RecordingAnomalies {
    fn report(&mut self, id: Uuid, message: &str) {
        self.inner.lock().unwrap().push((id, message.to_string()));
    }
}

impl RecordingAnomalies {
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_of(&self, id: Uuid) -> usize {
        self.inner.lock().unwrap().iter().filter(|(i, _)| *i == id).count()
    }
}

#[derive(Clone, Default)]
pub struct SharedStats {
    inner: Arc<Mutex<Vec<OutgoingSmsReport>>>,
}

impl SmsStatsSink for SharedStats {
    fn on_outgoing_sms(&mut self, report: &OutgoingSmsReport) {
        self.inner.lock().unwrap().push(report.clone());
    }
}

impl SharedStats {
    pub fn reports(&self) -> Vec<OutgoingSmsReport> {
        self.inner.lock().unwrap().clone()
    }
}

// ---- assembled stack ---------------------------------------------------

pub struct StackOptions {
    pub config: StackConfig,
    pub platform: FakePlatform,
    pub carrier: CarrierControl,
    pub encoder_fail: bool,
    pub sim: FakeSimRecords,
}

impl Default for StackOptions {
    fn default() -> Self {
        Self {
            config: StackConfig::default(),
            platform: FakePlatform::default(),
            carrier: CarrierControl::none(),
            encoder_fail: false,
            sim: FakeSimRecords::with_value(0),
        }
    }
}

pub struct TestStack {
    pub router: MessageRouter,
    pub handle: StackHandle,
    pub events: broadcast::Receiver<StackEvent>,
    pub store: FakeMessageStore,
    pub usage: FakeUsage,
    pub radio: RadioScript,
    pub carrier: CarrierControl,
    pub anomalies: RecordingAnomalies,
    pub stats: SharedStats,
    pub sim: FakeSimRecords,
}

impl TestStack {
    pub fn pump(&mut self) {
        self.router.tick();
    }

    pub fn advance(&mut self, ms: u64) {
        self.router.advance(ms);
    }

    pub fn next_event(&mut self) -> Option<StackEvent> {
        self.events.try_recv().ok()
    }
}

/// Fixtures around a dispatch entity driven directly (no router), for tests
/// that need full control over completion ordering.
pub struct EntityFixtures {
    pub store: FakeMessageStore,
    pub usage: FakeUsage,
    pub anomalies: RecordingAnomalies,
    pub stats: SharedStats,
    pub events: broadcast::Receiver<StackEvent>,
    pub handle: StackHandle,
}

pub fn build_entity(opts: StackOptions) -> (SmsDispatchEntity, EntityFixtures) {
    let config = config::shared(opts.config);
    let (handle, _gateway) = StackHandle::channel();
    let (events_tx, events_rx) = event_channel();

    let store = FakeMessageStore::default();
    let usage = FakeUsage::default();
    let anomalies = RecordingAnomalies::default();
    let stats = SharedStats::default();

    let deps = DispatchDeps {
        encoder: Box::new(FakeEncoder { fail: opts.encoder_fail }),
        message_store: Box::new(store.clone()),
        sim: Box::new(opts.sim.clone()),
        subs: Box::new(FakeSubscriptionStore::default()),
        usage: Box::new(usage.clone()),
        platform: Box::new(opts.platform.clone()),
        carrier: Box::new(opts.carrier.lookup()),
        stats: Box::new(stats.clone()),
        anomalies: Box::new(anomalies.clone()),
    };
    let entity = SmsDispatchEntity::new(
        config,
        SUB_ID,
        SmsFormat::ThreeGpp,
        deps,
        events_tx,
        handle.clone(),
    );
    (entity, EntityFixtures { store, usage, anomalies, stats, events: events_rx, handle })
}

/// A full loop with the dispatch entity wired to fakes and a scripted radio.
pub fn build_stack(opts: StackOptions) -> TestStack {
    let config = config::shared(opts.config);
    let (handle, gateway) = StackHandle::channel();
    let (events_tx, events_rx) = event_channel();

    let store = FakeMessageStore::default();
    let usage = FakeUsage::default();
    let anomalies = RecordingAnomalies::default();
    let stats = SharedStats::default();
    let radio = RadioScript::default();
    let sim = opts.sim.clone();

    let deps = DispatchDeps {
        encoder: Box::new(FakeEncoder { fail: opts.encoder_fail }),
        message_store: Box::new(store.clone()),
        sim: Box::new(sim.clone()),
        subs: Box::new(FakeSubscriptionStore::default()),
        usage: Box::new(usage.clone()),
        platform: Box::new(opts.platform.clone()),
        carrier: Box::new(opts.carrier.lookup()),
        stats: Box::new(stats.clone()),
        anomalies: Box::new(anomalies.clone()),
    };
    let dispatch = SmsDispatchEntity::new(
        config.clone(),
        SUB_ID,
        SmsFormat::ThreeGpp,
        deps,
        events_tx,
        handle.clone(),
    );

    let mut router = MessageRouter::new(config);
    router.register_entity(Box::new(gateway));
    router.register_entity(Box::new(dispatch));
    router.register_entity(Box::new(FakeRadio::new(radio.clone())));

    TestStack {
        router,
        handle,
        events: events_rx,
        store,
        usage,
        radio,
        carrier: opts.carrier,
        anomalies,
        stats,
        sim,
    }
}
