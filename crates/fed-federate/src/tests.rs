//! Unit tests for the federate: grant processing against an in-memory
//! simulator bridge.

#![allow(clippy::field_reassign_with_default)]

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use fed_bridge::{
    BridgeError, BridgeResult, Connector, DepartLane, DepartSpeed, PoiControl, RouteControl,
    SignalGroupSample, SimulationControl, StepSample, VehicleControl, VehicleSample,
};
use fed_core::{
    DetectorId, EdgeId, FederateConfig, FederateId, GeoPoint, Highlight, PositionSyncMode,
    RoadPosition, RouteId, SignalGroupDefinition, SignalGroupId, SignalState, SimTime, StopMode,
    VehicleClass, VehicleData, VehicleId, VehicleRoute, VehicleType, VehicleTypeId,
};
use fed_step::VehicleMovements;

use crate::ambassador::FederateAmbassador;
use crate::context::RtiSink;
use crate::error::FederateError;
use crate::interaction::{
    Interaction, LaneChangeTarget, LaneSelection, Outbound, SignalCommand, SpeedChange,
    SpeedSelection, VehicleDeparture, VehicleParameter, VehicleRegistration,
};

// ── In-memory simulator bridge ────────────────────────────────────────────────

#[derive(Default)]
struct MockState {
    /// One entry per command, in call order.
    calls: Vec<String>,
    /// Vehicles whose insertion the simulator rejects.
    fail_insert: Vec<VehicleId>,
    /// Routes the simulator knows.
    routes: Vec<VehicleRoute>,
    signal_groups: Vec<SignalGroupId>,
    /// Samples delivered by `simulate_until`, keyed by step time.
    steps: FxHashMap<SimTime, Vec<StepSample>>,
    lane_length: f64,
}

type Shared = Rc<RefCell<MockState>>;

struct MockBridge {
    state: Shared,
}

impl MockBridge {
    fn log(&self, entry: String) {
        self.state.borrow_mut().calls.push(entry);
    }
}

struct MockConnector {
    state: Shared,
}

impl Connector for MockConnector {
    type Bridge = MockBridge;

    fn try_connect(&mut self) -> BridgeResult<MockBridge> {
        Ok(MockBridge { state: self.state.clone() })
    }
}

impl VehicleControl for MockBridge {
    fn add_vehicle(
        &mut self,
        vehicle: &VehicleId,
        route: &RouteId,
        vehicle_type: &VehicleTypeId,
        lane: DepartLane,
        position: f64,
        speed: DepartSpeed,
    ) -> BridgeResult<()> {
        if self.state.borrow().fail_insert.contains(vehicle) {
            return Err(BridgeError::command("add_vehicle", "vehicle rejected"));
        }
        self.log(format!(
            "add_vehicle {vehicle} route={route} type={vehicle_type} lane={lane:?} pos={position} speed={speed:?}"
        ));
        Ok(())
    }

    fn remove_vehicle(&mut self, vehicle: &VehicleId) -> BridgeResult<()> {
        self.log(format!("remove_vehicle {vehicle}"));
        Ok(())
    }

    fn slow_down(&mut self, vehicle: &VehicleId, speed: f64, _duration: SimTime) -> BridgeResult<()> {
        self.log(format!("slow_down {vehicle} {speed}"));
        Ok(())
    }

    fn set_speed(&mut self, vehicle: &VehicleId, speed: f64) -> BridgeResult<()> {
        self.log(format!("set_speed {vehicle} {speed}"));
        Ok(())
    }

    fn change_lane(&mut self, vehicle: &VehicleId, lane_index: u32, _duration: SimTime) -> BridgeResult<()> {
        self.log(format!("change_lane {vehicle} {lane_index}"));
        Ok(())
    }

    fn set_route(&mut self, vehicle: &VehicleId, route: &RouteId) -> BridgeResult<()> {
        self.log(format!("set_route {vehicle} {route}"));
        Ok(())
    }

    fn stop(
        &mut self,
        vehicle: &VehicleId,
        edge: &EdgeId,
        position: f64,
        lane_index: u32,
        _duration: SimTime,
        stop_flags: u32,
    ) -> BridgeResult<()> {
        self.log(format!("stop {vehicle} {edge} {position} lane={lane_index} flags={stop_flags}"));
        Ok(())
    }

    fn resume(&mut self, vehicle: &VehicleId) -> BridgeResult<()> {
        self.log(format!("resume {vehicle}"));
        Ok(())
    }

    fn move_to(
        &mut self,
        vehicle: &VehicleId,
        _position: GeoPoint,
        _heading: f64,
        mode: PositionSyncMode,
    ) -> BridgeResult<()> {
        self.log(format!("move_to {vehicle} {mode:?}"));
        Ok(())
    }

    fn highlight(&mut self, vehicle: &VehicleId, color: &str) -> BridgeResult<()> {
        self.log(format!("highlight {vehicle} {color}"));
        Ok(())
    }

    fn update_best_lanes(&mut self, vehicle: &VehicleId) -> BridgeResult<()> {
        self.log(format!("update_best_lanes {vehicle}"));
        Ok(())
    }

    fn set_max_speed(&mut self, vehicle: &VehicleId, speed: f64) -> BridgeResult<()> {
        self.log(format!("set_max_speed {vehicle} {speed}"));
        Ok(())
    }

    fn set_max_acceleration(&mut self, vehicle: &VehicleId, accel: f64) -> BridgeResult<()> {
        self.log(format!("set_max_acceleration {vehicle} {accel}"));
        Ok(())
    }

    fn set_max_deceleration(&mut self, vehicle: &VehicleId, decel: f64) -> BridgeResult<()> {
        self.log(format!("set_max_deceleration {vehicle} {decel}"));
        Ok(())
    }

    fn set_minimum_gap(&mut self, vehicle: &VehicleId, gap: f64) -> BridgeResult<()> {
        self.log(format!("set_minimum_gap {vehicle} {gap}"));
        Ok(())
    }

    fn set_reaction_time(&mut self, vehicle: &VehicleId, tau: f64) -> BridgeResult<()> {
        self.log(format!("set_reaction_time {vehicle} {tau}"));
        Ok(())
    }

    fn set_speed_factor(&mut self, vehicle: &VehicleId, factor: f64) -> BridgeResult<()> {
        self.log(format!("set_speed_factor {vehicle} {factor}"));
        Ok(())
    }

    fn set_imperfection(&mut self, vehicle: &VehicleId, sigma: f64) -> BridgeResult<()> {
        self.log(format!("set_imperfection {vehicle} {sigma}"));
        Ok(())
    }

    fn set_vehicle_length(&mut self, vehicle: &VehicleId, length: f64) -> BridgeResult<()> {
        self.log(format!("set_vehicle_length {vehicle} {length}"));
        Ok(())
    }

    fn set_lane_change_mode(&mut self, vehicle: &VehicleId, mode: u32) -> BridgeResult<()> {
        self.log(format!("set_lane_change_mode {vehicle} {mode}"));
        Ok(())
    }

    fn set_speed_mode(&mut self, vehicle: &VehicleId, mode: u32) -> BridgeResult<()> {
        self.log(format!("set_speed_mode {vehicle} {mode}"));
        Ok(())
    }

    fn set_color(&mut self, vehicle: &VehicleId, color: &str) -> BridgeResult<()> {
        self.log(format!("set_color {vehicle} {color}"));
        Ok(())
    }
}

impl SimulationControl for MockBridge {
    fn simulate_until(&mut self, time: SimTime) -> BridgeResult<Vec<StepSample>> {
        self.log(format!("simulate_until {time}"));
        Ok(self.state.borrow_mut().steps.remove(&time).unwrap_or_default())
    }

    fn subscribe_vehicle(&mut self, vehicle: &VehicleId, _from: SimTime, _until: SimTime) -> BridgeResult<()> {
        self.log(format!("subscribe_vehicle {vehicle}"));
        Ok(())
    }

    fn subscribe_field_of_vision(
        &mut self,
        vehicle: &VehicleId,
        range_m: f64,
        _from: SimTime,
        _until: SimTime,
    ) -> BridgeResult<()> {
        self.log(format!("subscribe_field_of_vision {vehicle} {range_m}"));
        Ok(())
    }

    fn subscribe_induction_loop(&mut self, detector: &DetectorId, _from: SimTime, _until: SimTime) -> BridgeResult<()> {
        self.log(format!("subscribe_induction_loop {detector}"));
        Ok(())
    }

    fn subscribe_lane_area(&mut self, detector: &DetectorId, _from: SimTime, _until: SimTime) -> BridgeResult<()> {
        self.log(format!("subscribe_lane_area {detector}"));
        Ok(())
    }

    fn subscribe_signal_group(&mut self, group: &SignalGroupId, _from: SimTime, _until: SimTime) -> BridgeResult<()> {
        self.log(format!("subscribe_signal_group {group}"));
        Ok(())
    }

    fn set_lane_allowed_classes(
        &mut self,
        edge: &EdgeId,
        lane_index: u32,
        classes: &[&str],
    ) -> BridgeResult<()> {
        self.log(format!("set_lane_allowed_classes {edge} {lane_index} [{}]", classes.join(",")));
        Ok(())
    }

    fn set_lane_disallowed_classes(
        &mut self,
        edge: &EdgeId,
        lane_index: u32,
        classes: &[&str],
    ) -> BridgeResult<()> {
        self.log(format!(
            "set_lane_disallowed_classes {edge} {lane_index} [{}]",
            classes.join(",")
        ));
        Ok(())
    }

    fn set_lane_max_speed(&mut self, edge: &EdgeId, lane_index: u32, speed: f64) -> BridgeResult<()> {
        self.log(format!("set_lane_max_speed {edge} {lane_index} {speed}"));
        Ok(())
    }

    fn lane_length(&mut self, _edge: &EdgeId, _lane_index: u32) -> BridgeResult<f64> {
        Ok(self.state.borrow().lane_length)
    }

    fn signal_group_ids(&mut self) -> BridgeResult<Vec<SignalGroupId>> {
        self.log("signal_group_ids".into());
        Ok(self.state.borrow().signal_groups.clone())
    }

    fn signal_group_definition(&mut self, group: &SignalGroupId) -> BridgeResult<SignalGroupDefinition> {
        Ok(SignalGroupDefinition { id: group.clone(), controlled_lanes: vec!["e1_0".into()] })
    }

    fn signal_group_state(&mut self, group: &SignalGroupId) -> BridgeResult<SignalGroupSample> {
        Ok(SignalGroupSample {
            id: group.clone(),
            program_id: "0".into(),
            phase_index: 1,
            next_switch_s: 42.0,
            states: "gr".into(),
        })
    }

    fn set_signal_phase(&mut self, group: &SignalGroupId, phase_index: u32) -> BridgeResult<()> {
        self.log(format!("set_signal_phase {group} {phase_index}"));
        Ok(())
    }

    fn set_signal_program(&mut self, group: &SignalGroupId, program_id: &str) -> BridgeResult<()> {
        self.log(format!("set_signal_program {group} {program_id}"));
        Ok(())
    }

    fn set_signal_remaining_duration(&mut self, group: &SignalGroupId, duration: SimTime) -> BridgeResult<()> {
        self.log(format!("set_signal_remaining_duration {group} {duration}"));
        Ok(())
    }

    fn set_signal_custom_state(&mut self, group: &SignalGroupId, states: &[SignalState]) -> BridgeResult<()> {
        let encoded: String = states.iter().map(|s| s.encode()).collect();
        self.log(format!("set_signal_custom_state {group} {encoded}"));
        Ok(())
    }

    fn execute_raw(&mut self, payload: &[u8]) -> BridgeResult<Vec<u8>> {
        self.log(format!("execute_raw {} bytes", payload.len()));
        Ok(b"ok".to_vec())
    }
}

impl RouteControl for MockBridge {
    fn route_ids(&mut self) -> BridgeResult<Vec<RouteId>> {
        Ok(self.state.borrow().routes.iter().map(|r| r.id.clone()).collect())
    }

    fn route_edges(&mut self, route: &RouteId) -> BridgeResult<Vec<EdgeId>> {
        self.state
            .borrow()
            .routes
            .iter()
            .find(|r| &r.id == route)
            .map(|r| r.edges.clone())
            .ok_or_else(|| BridgeError::command("route_edges", "unknown route"))
    }

    fn add_route(&mut self, route: &VehicleRoute) -> BridgeResult<()> {
        self.log(format!("add_route {}", route.id));
        self.state.borrow_mut().routes.push(route.clone());
        Ok(())
    }
}

impl PoiControl for MockBridge {
    fn add_speed_sign(&mut self, sign_id: &str, _position: GeoPoint, speed: f64) -> BridgeResult<()> {
        self.log(format!("add_speed_sign {sign_id} {speed}"));
        Ok(())
    }

    fn add_lane_assignment_sign(&mut self, sign_id: &str, _position: GeoPoint, lanes: &[u32]) -> BridgeResult<()> {
        self.log(format!("add_lane_assignment_sign {sign_id} {lanes:?}"));
        Ok(())
    }

    fn set_variable_speed(&mut self, sign_id: &str, speed: f64) -> BridgeResult<()> {
        self.log(format!("set_variable_speed {sign_id} {speed}"));
        Ok(())
    }

    fn set_variable_lane_assignment(&mut self, sign_id: &str, lanes: &[u32]) -> BridgeResult<()> {
        self.log(format!("set_variable_lane_assignment {sign_id} {lanes:?}"));
        Ok(())
    }
}

// ── Recording sink ────────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingSink {
    published: Vec<Outbound>,
    advances: Vec<SimTime>,
}

impl RtiSink for RecordingSink {
    fn publish(&mut self, message: Outbound) {
        self.published.push(message);
    }

    fn request_advance(&mut self, time: SimTime) {
        self.advances.push(time);
    }
}

impl RecordingSink {
    fn movements(&self) -> Vec<&VehicleMovements> {
        self.published
            .iter()
            .filter_map(|m| match m {
                Outbound::VehicleMovements(v) => Some(v),
                _ => None,
            })
            .collect()
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn new_state() -> Shared {
    let mut state = MockState::default();
    state.lane_length = 100.0;
    state.routes.push(route("r1", &["e1", "e2", "e3"]));
    Rc::new(RefCell::new(state))
}

fn route(id: &str, edges: &[&str]) -> VehicleRoute {
    VehicleRoute {
        id: RouteId::new(id),
        edges: edges.iter().map(|e| EdgeId::new(*e)).collect(),
    }
}

fn ambassador(state: &Shared) -> FederateAmbassador<MockConnector> {
    ambassador_with(state, FederateConfig::default())
}

fn ambassador_with(state: &Shared, config: FederateConfig) -> FederateAmbassador<MockConnector> {
    FederateAmbassador::new(
        config,
        FederateId::new("traffic0"),
        MockConnector { state: state.clone() },
        SimTime::from_seconds(3_600),
    )
}

fn vehicle_type(class: VehicleClass) -> VehicleType {
    VehicleType {
        id: VehicleTypeId::new("car"),
        vehicle_class: class,
        length: 5.0,
        min_gap: 2.5,
        max_speed: 50.0,
        max_acceleration: 2.6,
        max_deceleration: 4.5,
        reaction_time: 1.0,
        speed_factor: 1.0,
        sigma: 0.5,
        color: None,
    }
}

fn registration(vehicle: &str, depart: SimTime) -> VehicleRegistration {
    VehicleRegistration {
        time: depart,
        vehicle: VehicleId::new(vehicle),
        vehicle_type: vehicle_type(VehicleClass::Car),
        departure: VehicleDeparture {
            time: depart,
            route: RouteId::new("r1"),
            connection_index: 0,
            lane: LaneSelection::Best,
            position: 0.0,
            speed: SpeedSelection::Maximum,
        },
        has_applications: true,
    }
}

fn vehicle_sample(id: &str, lane_index: u32) -> VehicleSample {
    VehicleSample {
        id: VehicleId::new(id),
        position: Some(GeoPoint::new(52.0, 13.1)),
        edge: Some(EdgeId::new("e1")),
        lane_index,
        lane_position: 20.0,
        lateral_lane_position: 0.0,
        speed: 10.0,
        distance_driven: 100.0,
        heading: 90.0,
        slope: 0.0,
        route_id: Some(RouteId::new("r1")),
        signals_encoded: 0,
        stopped_state_encoded: 0,
        min_gap: 2.5,
        co2: 0.0,
        co: 0.0,
        hc: 0.0,
        pmx: 0.0,
        nox: 0.0,
        fuel: 0.0,
        leader: None,
        follower: None,
    }
}

fn vehicle_data(id: &str) -> VehicleData {
    VehicleData {
        time: SimTime::from_seconds(1),
        id: VehicleId::new(id),
        position: Some(GeoPoint::new(52.0, 13.0)),
        road: Some(RoadPosition {
            connection: EdgeId::new("e1"),
            lane_index: 0,
            offset: 10.0,
            lateral: 0.0,
        }),
        speed: 8.0,
        acceleration: 0.0,
        distance_driven: 100.0,
        heading: 90.0,
        slope: 0.0,
        route_id: Some(RouteId::new("r1")),
        signals: Default::default(),
        stop_mode: StopMode::Driving,
        consumptions: Default::default(),
        emissions: Default::default(),
        sensors: None,
        lane_area: None,
        vehicles_in_sight: Vec::new(),
    }
}

fn queue_step(state: &Shared, time: SimTime, samples: Vec<StepSample>) {
    state.borrow_mut().steps.insert(time, samples);
}

fn calls_matching(state: &Shared, prefix: &str) -> Vec<String> {
    state
        .borrow()
        .calls
        .iter()
        .filter(|c| c.starts_with(prefix))
        .cloned()
        .collect()
}

fn has_call(state: &Shared, entry: &str) -> bool {
    state.borrow().calls.iter().any(|c| c == entry)
}

fn sec(s: u64) -> SimTime {
    SimTime::from_seconds(s)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod dispatch {
    use super::*;

    #[test]
    fn future_interaction_is_fatal() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.buffer().push(Interaction::VehicleResume {
            time: sec(2),
            vehicle: VehicleId::new("v1"),
        });
        let err = amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            FederateError::ProtocolViolation { interaction_time, grant_time }
                if interaction_time == sec(2) && grant_time == SimTime::ZERO
        ));
    }

    #[test]
    fn unknown_interaction_type_is_discarded() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.buffer().push(Interaction::Foreign {
            time: SimTime::ZERO,
            type_id: "org.example.Esoteric".into(),
        });
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        assert_eq!(sink.advances, vec![sec(1)]);
    }

    #[test]
    fn duplicate_route_registration_keeps_first_definition() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.buffer().push(Interaction::RouteRegistration {
            time: SimTime::ZERO,
            route: route("r2", &["e1"]),
        });
        amb.buffer().push(Interaction::RouteRegistration {
            time: SimTime::ZERO,
            route: route("r2", &["e9"]),
        });
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        let cached = amb.routes().get(&RouteId::new("r2")).unwrap();
        assert_eq!(cached.edges, vec![EdgeId::new("e1")]);
    }

    #[test]
    fn raw_command_round_trips() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();

        amb.buffer().push(Interaction::RawCommand {
            time: sec(1),
            request_id: 7,
            payload: vec![0xca, 0xfe],
        });
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        assert!(sink.published.iter().any(|m| matches!(
            m,
            Outbound::RawCommandResponse { request_id: 7, payload } if payload == b"ok"
        )));
    }
}

#[cfg(test)]
mod insertion {
    use super::*;

    #[test]
    fn due_vehicle_inserted_and_subscribed_once() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.buffer()
            .push(Interaction::VehicleRegistration(registration("v1", SimTime::ZERO)));
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();

        assert_eq!(calls_matching(&state, "add_vehicle v1").len(), 1);
        assert_eq!(calls_matching(&state, "subscribe_vehicle v1").len(), 1);
        assert!(amb.lifecycle().is_inserted(&VehicleId::new("v1")));
    }

    #[test]
    fn departure_in_the_future_waits() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.buffer()
            .push(Interaction::VehicleRegistration(registration("v1", sec(2))));
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        assert!(calls_matching(&state, "add_vehicle").is_empty());
        assert!(amb.lifecycle().is_pending(&VehicleId::new("v1")));

        amb.process_time_advance_grant(sec(2), &mut sink).unwrap();
        assert_eq!(calls_matching(&state, "add_vehicle v1").len(), 1);
    }

    #[test]
    fn failed_insertion_drops_the_vehicle() {
        let state = new_state();
        state.borrow_mut().fail_insert.push(VehicleId::new("v1"));
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.buffer()
            .push(Interaction::VehicleRegistration(registration("v1", SimTime::ZERO)));
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();

        let v1 = VehicleId::new("v1");
        assert!(!amb.lifecycle().is_pending(&v1));
        assert!(!amb.lifecycle().is_inserted(&v1));
        assert!(calls_matching(&state, "subscribe_vehicle").is_empty());
    }

    #[test]
    fn failed_insertion_aborts_when_configured() {
        let state = new_state();
        state.borrow_mut().fail_insert.push(VehicleId::new("v1"));
        let mut config = FederateConfig::default();
        config.exit_on_insertion_error = true;
        let mut amb = ambassador_with(&state, config);
        let mut sink = RecordingSink::default();
        amb.buffer()
            .push(Interaction::VehicleRegistration(registration("v1", SimTime::ZERO)));
        let err = amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap_err();
        assert!(matches!(err, FederateError::Insertion { vehicle, .. } if vehicle == VehicleId::new("v1")));
    }

    #[test]
    fn unknown_route_drops_the_vehicle() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        let mut reg = registration("v1", SimTime::ZERO);
        reg.departure.route = RouteId::new("nope");
        amb.buffer().push(Interaction::VehicleRegistration(reg));
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        assert!(calls_matching(&state, "add_vehicle").is_empty());
    }

    #[test]
    fn mid_route_departure_drives_the_suffix() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        let mut reg = registration("v1", SimTime::ZERO);
        reg.departure.connection_index = 2;
        amb.buffer().push(Interaction::VehicleRegistration(reg));
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();

        assert!(has_call(&state, "add_route r1_cut2"));
        let added = calls_matching(&state, "add_vehicle v1");
        assert_eq!(added.len(), 1);
        assert!(added[0].contains("route=r1_cut2"));
        let cut = amb.routes().get(&RouteId::new("r1_cut2")).unwrap();
        assert_eq!(cut.edges, vec![EdgeId::new("e3")]);
    }

    #[test]
    fn highway_policy_splits_on_vehicle_class() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        let mut truck = registration("truck1", SimTime::ZERO);
        truck.vehicle_type = vehicle_type(VehicleClass::HeavyGoodsVehicle);
        truck.departure.lane = LaneSelection::Highway;
        let mut car = registration("car1", SimTime::ZERO);
        car.departure.lane = LaneSelection::Highway;
        amb.buffer().push(Interaction::VehicleRegistration(truck));
        amb.buffer().push(Interaction::VehicleRegistration(car));
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();

        assert!(calls_matching(&state, "add_vehicle truck1")[0].contains("lane=First"));
        assert!(calls_matching(&state, "add_vehicle car1")[0].contains("lane=Best"));
    }
}

#[cfg(test)]
mod subscriptions {
    use super::*;

    #[test]
    fn only_application_vehicles_subscribed_when_configured() {
        let state = new_state();
        let mut config = FederateConfig::default();
        config.subscribe_to_all_vehicles = false;
        let mut amb = ambassador_with(&state, config);
        let mut sink = RecordingSink::default();
        let mut silent = registration("v2", SimTime::ZERO);
        silent.has_applications = false;
        amb.buffer()
            .push(Interaction::VehicleRegistration(registration("v1", SimTime::ZERO)));
        amb.buffer().push(Interaction::VehicleRegistration(silent));
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();

        assert_eq!(calls_matching(&state, "add_vehicle").len(), 2);
        assert!(has_call(&state, "subscribe_vehicle v1"));
        assert!(!has_call(&state, "subscribe_vehicle v2"));
    }

    #[test]
    fn detector_subscriptions_forwarded() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        amb.buffer().push(Interaction::InductionLoopSubscription {
            time: sec(1),
            detector: DetectorId::new("loop_1"),
        });
        amb.buffer().push(Interaction::LaneAreaSubscription {
            time: sec(1),
            detector: DetectorId::new("area_1"),
        });
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        assert!(has_call(&state, "subscribe_induction_loop loop_1"));
        assert!(has_call(&state, "subscribe_lane_area area_1"));
    }
}

#[cfg(test)]
mod speed {
    use super::*;

    #[test]
    fn ramped_change_pins_final_speed_on_the_step_grid() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();

        // due at 2.7s, snapped up to the 3s step
        amb.buffer().push(Interaction::VehicleSpeedChange {
            time: sec(1),
            vehicle: VehicleId::new("v1"),
            change: SpeedChange::Set { speed: 5.0, ramp: SimTime::from_millis(1_700) },
        });
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        assert!(has_call(&state, "slow_down v1 5"));
        assert!(calls_matching(&state, "set_speed").is_empty());

        amb.process_time_advance_grant(sec(2), &mut sink).unwrap();
        assert!(calls_matching(&state, "set_speed").is_empty());

        amb.process_time_advance_grant(sec(3), &mut sink).unwrap();
        amb.process_time_advance_grant(sec(4), &mut sink).unwrap();
        assert_eq!(calls_matching(&state, "set_speed v1 5"), vec!["set_speed v1 5"]);
    }

    #[test]
    fn zero_ramp_sets_immediately() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        amb.buffer().push(Interaction::VehicleSpeedChange {
            time: sec(1),
            vehicle: VehicleId::new("v1"),
            change: SpeedChange::Set { speed: 7.5, ramp: SimTime::ZERO },
        });
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        amb.process_time_advance_grant(sec(2), &mut sink).unwrap();
        assert_eq!(calls_matching(&state, "set_speed v1 7.5").len(), 1);
        assert!(calls_matching(&state, "slow_down").is_empty());
    }

    #[test]
    fn reset_returns_control_to_the_model() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        amb.buffer().push(Interaction::VehicleSpeedChange {
            time: sec(1),
            vehicle: VehicleId::new("v1"),
            change: SpeedChange::Reset,
        });
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        assert!(has_call(&state, "set_speed v1 -1"));
    }
}

#[cfg(test)]
mod deferred {
    use fed_core::{SimTime, VehicleId};

    use crate::deferred::{DeferredEffect, DeferredEventScheduler};

    fn set_speed(vehicle: &str, speed: f64) -> DeferredEffect {
        DeferredEffect::SetSpeed { vehicle: VehicleId::new(vehicle), speed }
    }

    #[test]
    fn fires_in_time_order() {
        let mut s = DeferredEventScheduler::new();
        s.schedule(SimTime::from_seconds(3), set_speed("a", 1.0));
        s.schedule(SimTime::from_seconds(1), set_speed("b", 2.0));
        let due = s.drain_due(SimTime::from_seconds(3));
        assert_eq!(due, vec![set_speed("b", 2.0), set_speed("a", 1.0)]);
        assert!(s.is_empty());
    }

    #[test]
    fn equal_times_fire_in_schedule_order() {
        let mut s = DeferredEventScheduler::new();
        s.schedule(SimTime::from_seconds(2), set_speed("a", 1.0));
        s.schedule(SimTime::from_seconds(2), set_speed("b", 2.0));
        let due = s.drain_due(SimTime::from_seconds(2));
        assert_eq!(due, vec![set_speed("a", 1.0), set_speed("b", 2.0)]);
    }

    #[test]
    fn undue_effects_stay_queued() {
        let mut s = DeferredEventScheduler::new();
        s.schedule(SimTime::from_seconds(5), set_speed("a", 1.0));
        assert!(s.drain_due(SimTime::from_seconds(4)).is_empty());
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn later_schedule_never_cancels_an_earlier_one() {
        let mut s = DeferredEventScheduler::new();
        s.schedule(SimTime::from_seconds(2), set_speed("a", 1.0));
        s.schedule(SimTime::from_seconds(3), set_speed("a", 9.0));
        let due = s.drain_due(SimTime::from_seconds(3));
        assert_eq!(due.len(), 2);
    }
}

#[cfg(test)]
mod route_cache {
    use fed_core::{EdgeId, RouteId};

    use crate::error::FederateError;
    use crate::routes::{CacheOutcome, RouteCache};

    use super::route;

    #[test]
    fn duplicate_insert_keeps_first() {
        let mut cache = RouteCache::new();
        assert_eq!(cache.insert(route("r1", &["e1"])), CacheOutcome::Inserted);
        assert_eq!(cache.insert(route("r1", &["e9"])), CacheOutcome::AlreadyKnown);
        assert_eq!(cache.get(&RouteId::new("r1")).unwrap().edges, vec![EdgeId::new("e1")]);
    }

    #[test]
    fn cut_route_is_the_suffix() {
        let mut cache = RouteCache::new();
        cache.insert(route("r1", &["e1", "e2", "e3", "e4"]));
        let (cut, created) = cache.cut_route(&RouteId::new("r1"), 2).unwrap();
        assert!(created);
        assert_eq!(cut.id, RouteId::new("r1_cut2"));
        assert_eq!(cut.edges, vec![EdgeId::new("e3"), EdgeId::new("e4")]);
    }

    #[test]
    fn repeated_cut_reuses_the_cached_route() {
        let mut cache = RouteCache::new();
        cache.insert(route("r1", &["e1", "e2", "e3"]));
        let (first, created) = cache.cut_route(&RouteId::new("r1"), 1).unwrap();
        assert!(created);
        let (second, created) = cache.cut_route(&RouteId::new("r1"), 1).unwrap();
        assert!(!created);
        assert_eq!(first, second);
    }

    #[test]
    fn cut_of_unknown_base_fails() {
        let mut cache = RouteCache::new();
        let err = cache.cut_route(&RouteId::new("ghost"), 1).unwrap_err();
        assert!(matches!(err, FederateError::MissingRoute(id) if id == RouteId::new("ghost")));
    }
}

#[cfg(test)]
mod external {
    use super::*;

    fn assign_external(amb: &FederateAmbassador<MockConnector>, vehicle: &str, time: SimTime) {
        amb.buffer().push(Interaction::VehicleFederateAssignment {
            time,
            vehicle: VehicleId::new(vehicle),
            federate: FederateId::new("other"),
        });
    }

    #[test]
    fn commands_for_external_vehicles_are_skipped() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        assign_external(&amb, "v1", sec(1));
        amb.buffer().push(Interaction::VehicleSlowDown {
            time: sec(1),
            vehicle: VehicleId::new("v1"),
            speed: 2.0,
            duration: sec(5),
        });
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        assert!(calls_matching(&state, "slow_down").is_empty());
    }

    #[test]
    fn assignment_to_self_keeps_ownership() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        amb.buffer().push(Interaction::VehicleFederateAssignment {
            time: sec(1),
            vehicle: VehicleId::new("v1"),
            federate: FederateId::new("traffic0"),
        });
        amb.buffer().push(Interaction::VehicleSlowDown {
            time: sec(1),
            vehicle: VehicleId::new("v1"),
            speed: 2.0,
            duration: sec(5),
        });
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        assert!(has_call(&state, "slow_down v1 2"));
    }

    #[test]
    fn external_vehicle_is_mirrored_and_stripped_from_publication() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();

        assign_external(&amb, "ext1", sec(1));
        let mut movements = VehicleMovements::default();
        movements.added.push(vehicle_data("ext1"));
        amb.buffer().push(Interaction::VehicleUpdates {
            time: sec(1),
            origin: FederateId::new("other"),
            movements,
        });
        queue_step(
            &state,
            sec(1),
            vec![
                StepSample::Vehicle(vehicle_sample("own1", 0)),
                StepSample::Vehicle(vehicle_sample("ext1", 0)),
            ],
        );
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();

        assert!(has_call(&state, "add_route external_ext1"));
        let mirrored = calls_matching(&state, "add_vehicle ext1");
        assert_eq!(mirrored.len(), 1);
        assert!(mirrored[0].contains("type=DEFAULT_VEHTYPE"));
        assert!(has_call(&state, "move_to ext1 SwitchRoute"));

        let published = sink.movements();
        let last = published.last().unwrap();
        let added: Vec<&VehicleId> = last.added.iter().map(|v| &v.id).collect();
        assert_eq!(added, vec![&VehicleId::new("own1")]);
    }

    #[test]
    fn removal_by_the_owner_reaches_subscribers() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();

        assign_external(&amb, "ext1", sec(1));
        let mut added = VehicleMovements::default();
        added.added.push(vehicle_data("ext1"));
        amb.buffer().push(Interaction::VehicleUpdates {
            time: sec(1),
            origin: FederateId::new("other"),
            movements: added,
        });
        queue_step(
            &state,
            sec(1),
            vec![
                StepSample::Vehicle(vehicle_sample("own1", 0)),
                StepSample::Vehicle(vehicle_sample("ext1", 0)),
            ],
        );
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();

        let mut removal = VehicleMovements::default();
        removal.removed.push(VehicleId::new("ext1"));
        amb.buffer().push(Interaction::VehicleUpdates {
            time: sec(2),
            origin: FederateId::new("other"),
            movements: removal,
        });
        queue_step(&state, sec(2), vec![StepSample::Vehicle(vehicle_sample("own1", 0))]);
        amb.process_time_advance_grant(sec(2), &mut sink).unwrap();

        assert!(has_call(&state, "remove_vehicle ext1"));
        let last = *sink.movements().last().unwrap();
        assert_eq!(last.removed, vec![VehicleId::new("ext1")]);
    }

    #[test]
    fn updates_from_this_federate_are_ignored() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();

        let mut movements = VehicleMovements::default();
        movements.added.push(vehicle_data("v1"));
        amb.buffer().push(Interaction::VehicleUpdates {
            time: sec(1),
            origin: FederateId::new("traffic0"),
            movements,
        });
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        assert!(calls_matching(&state, "add_vehicle").is_empty());
    }
}

#[cfg(test)]
mod lane_changes {
    use super::*;

    #[test]
    fn relative_change_uses_the_last_known_lane() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        queue_step(&state, sec(1), vec![StepSample::Vehicle(vehicle_sample("v1", 1))]);
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();

        amb.buffer().push(Interaction::VehicleLaneChange {
            time: sec(2),
            vehicle: VehicleId::new("v1"),
            target: LaneChangeTarget::ToLeft,
            duration: sec(5),
        });
        amb.process_time_advance_grant(sec(2), &mut sink).unwrap();
        assert!(has_call(&state, "change_lane v1 2"));
    }

    #[test]
    fn relative_change_without_a_known_lane_is_ignored() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        amb.buffer().push(Interaction::VehicleLaneChange {
            time: sec(1),
            vehicle: VehicleId::new("ghost"),
            target: LaneChangeTarget::ToRight,
            duration: sec(5),
        });
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        assert!(calls_matching(&state, "change_lane").is_empty());
    }

    #[test]
    fn lane_change_highlights_when_configured() {
        let state = new_state();
        let mut config = FederateConfig::default();
        config.highlights = vec![Highlight::ChangeLane];
        let mut amb = ambassador_with(&state, config);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        amb.buffer().push(Interaction::VehicleLaneChange {
            time: sec(1),
            vehicle: VehicleId::new("v1"),
            target: LaneChangeTarget::ByIndex(0),
            duration: sec(5),
        });
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        assert!(has_call(&state, "change_lane v1 0"));
        assert!(has_call(&state, "highlight v1 red"));
    }
}

#[cfg(test)]
mod stops {
    use super::*;

    fn stop(vehicle: &str, position: f64, mode: StopMode) -> Interaction {
        Interaction::VehicleStop {
            time: sec(1),
            vehicle: VehicleId::new(vehicle),
            edge: EdgeId::new("e1"),
            position,
            lane_index: 0,
            duration: sec(20),
            mode,
        }
    }

    #[test]
    fn stop_position_is_clamped_into_the_lane() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        amb.buffer().push(stop("v1", 250.0, StopMode::Stopped));
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        assert!(has_call(&state, "stop v1 e1 100 lane=0 flags=1"));
    }

    #[test]
    fn parking_area_stop_keeps_the_requested_position() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        amb.buffer().push(stop("v1", 250.0, StopMode::ParkedParkingArea));
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        assert!(has_call(&state, "stop v1 e1 250 lane=0 flags=128"));
    }

    #[test]
    fn resume_is_forwarded() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        amb.buffer().push(Interaction::VehicleResume {
            time: sec(1),
            vehicle: VehicleId::new("v1"),
        });
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        assert!(has_call(&state, "resume v1"));
    }
}

#[cfg(test)]
mod parameters {
    use super::*;

    #[test]
    fn reaction_time_is_floored_at_the_step_length() {
        let state = new_state();
        let mut config = FederateConfig::default();
        config.time_gap_offset = 0.3;
        let mut amb = ambassador_with(&state, config);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        amb.buffer().push(Interaction::VehicleParameterChange {
            time: sec(1),
            vehicle: VehicleId::new("v1"),
            parameters: vec![
                VehicleParameter::ReactionTime(0.5),
                VehicleParameter::MaxSpeed(33.0),
            ],
        });
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        // 0.5 + 0.3 offset = 0.8, below the 1s step length
        assert!(has_call(&state, "set_reaction_time v1 1"));
        assert!(has_call(&state, "set_max_speed v1 33"));
    }

    #[test]
    fn sensor_activation_needs_no_simulator_command() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        let before = state.borrow().calls.len();
        amb.buffer().push(Interaction::VehicleSensorActivation {
            time: sec(1),
            vehicle: VehicleId::new("v1"),
            front_range: Some(100.0),
            rear_range: None,
        });
        queue_step(&state, sec(1), vec![StepSample::Vehicle(vehicle_sample("v1", 0))]);
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        // only the step itself talked to the simulator
        assert_eq!(state.borrow().calls.len(), before + 1);
        let last = *sink.movements().last().unwrap();
        assert!(last.added[0].sensors.is_some());
    }
}

#[cfg(test)]
mod signals {
    use super::*;

    #[test]
    fn signal_groups_registered_after_connecting() {
        let state = new_state();
        state.borrow_mut().signal_groups.push(SignalGroupId::new("tl1"));
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        assert!(sink.published.iter().any(|m| matches!(
            m,
            Outbound::SignalGroupRegistration(defs) if defs.len() == 1 && defs[0].id == SignalGroupId::new("tl1")
        )));
    }

    #[test]
    fn signal_command_publishes_the_resulting_state() {
        let state = new_state();
        state.borrow_mut().signal_groups.push(SignalGroupId::new("tl1"));
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        amb.buffer().push(Interaction::SignalStateChange {
            time: sec(1),
            group: SignalGroupId::new("tl1"),
            command: SignalCommand::Phase(2),
        });
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();

        assert!(has_call(&state, "set_signal_phase tl1 2"));
        let update = sink
            .published
            .iter()
            .find_map(|m| match m {
                Outbound::SignalGroupUpdates { groups, .. } if !groups.is_empty() => Some(&groups[0]),
                _ => None,
            })
            .unwrap();
        assert_eq!(update.phase_index, 1);
        assert_eq!(update.next_switch, SimTime::from_seconds(42));
        assert_eq!(update.states, vec![SignalState::Green, SignalState::Red]);
    }
}

#[cfg(test)]
mod lane_properties {
    use super::*;

    #[test]
    fn property_change_triggers_best_lane_recomputation() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.buffer()
            .push(Interaction::VehicleRegistration(registration("v1", SimTime::ZERO)));
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();

        amb.buffer().push(Interaction::LanePropertyChange {
            time: sec(1),
            edge: EdgeId::new("e1"),
            lane_index: 0,
            allowed: None,
            disallowed: Some(vec![VehicleClass::HeavyGoodsVehicle]),
            max_speed: Some(13.9),
        });
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        amb.process_time_advance_grant(sec(2), &mut sink).unwrap();

        // classes reach the simulator in its own vocabulary
        assert!(has_call(&state, "set_lane_disallowed_classes e1 0 [truck]"));
        assert!(has_call(&state, "set_lane_max_speed e1 0 13.9"));
        // recomputed once, not on every following step
        assert_eq!(calls_matching(&state, "update_best_lanes v1").len(), 1);
    }

    #[test]
    fn disallowing_every_class_closes_the_lane() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();

        amb.buffer().push(Interaction::LanePropertyChange {
            time: sec(1),
            edge: EdgeId::new("e1"),
            lane_index: 1,
            allowed: None,
            disallowed: Some(VehicleClass::ALL.to_vec()),
            max_speed: None,
        });
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();

        assert!(has_call(&state, "set_lane_allowed_classes e1 1 []"));
        assert!(calls_matching(&state, "set_lane_disallowed_classes").is_empty());
    }
}

#[cfg(test)]
mod pipeline {
    use super::*;

    #[test]
    fn first_grant_connects_and_publishes() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();

        assert!(has_call(&state, "signal_group_ids"));
        assert!(has_call(&state, "simulate_until 0.000s"));
        assert_eq!(sink.movements().len(), 1);
        assert_eq!(sink.advances, vec![sec(1)]);
        // simulator-declared routes are taken over
        assert!(amb.routes().contains(&RouteId::new("r1")));
    }

    #[test]
    fn intermediate_grant_only_dispatches() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();

        amb.buffer().push(Interaction::RouteRegistration {
            time: SimTime::from_millis(500),
            route: route("r9", &["e2"]),
        });
        amb.process_time_advance_grant(SimTime::from_millis(500), &mut sink).unwrap();

        assert!(has_call(&state, "add_route r9"));
        assert_eq!(calls_matching(&state, "simulate_until").len(), 1);
        assert_eq!(sink.advances, vec![sec(1)]);
    }

    #[test]
    fn simulator_discovered_route_is_propagated_once() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();

        // a route that appeared inside the simulator after connecting
        state.borrow_mut().routes.push(route("r_new", &["e2", "e3"]));
        let mut sample = vehicle_sample("v1", 0);
        sample.route_id = Some(RouteId::new("r_new"));
        queue_step(&state, sec(1), vec![StepSample::Vehicle(sample.clone())]);
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        queue_step(&state, sec(2), vec![StepSample::Vehicle(sample)]);
        amb.process_time_advance_grant(sec(2), &mut sink).unwrap();

        let registrations: Vec<_> = sink
            .published
            .iter()
            .filter(|m| matches!(m, Outbound::RouteRegistration(r) if r.id == RouteId::new("r_new")))
            .collect();
        assert_eq!(registrations.len(), 1);
        assert!(amb.routes().contains(&RouteId::new("r_new")));
    }

    #[test]
    fn detector_updates_published_only_when_present() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        assert!(!sink.published.iter().any(|m| matches!(m, Outbound::DetectorUpdates { .. })));

        queue_step(
            &state,
            sec(1),
            vec![StepSample::InductionLoop(fed_bridge::InductionLoopSample {
                id: DetectorId::new("loop_1"),
                mean_speed: 12.0,
                mean_vehicle_length: 4.8,
                passed_vehicles: 2,
            })],
        );
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();
        assert!(sink.published.iter().any(|m| matches!(
            m,
            Outbound::DetectorUpdates { induction_loops, .. } if induction_loops.len() == 1
        )));
    }

    #[test]
    fn movement_batches_carry_the_publication_schedule() {
        let state = new_state();
        let mut amb = ambassador(&state);
        let mut sink = RecordingSink::default();
        amb.process_time_advance_grant(SimTime::ZERO, &mut sink).unwrap();
        queue_step(&state, sec(1), vec![StepSample::Vehicle(vehicle_sample("v1", 0))]);
        amb.process_time_advance_grant(sec(1), &mut sink).unwrap();

        let last = *sink.movements().last().unwrap();
        assert_eq!(last.time, sec(1));
        assert_eq!(last.next_update, sec(2));
        assert_eq!(sink.advances, vec![sec(1), sec(2)]);
    }
}
