//! Assembles raw simulator step samples into publishable result batches.
//!
//! # Design
//!
//! The builder keeps the previous step's [`VehicleData`] per vehicle.  Each
//! incoming vehicle sample is first classified into a [`SampleDisposition`]
//! and then handled uniformly per variant, so the parked / invalid-position
//! special cases live in exactly one place instead of being interleaved with
//! record construction.
//!
//! Classification of the movement batches is derived purely from key
//! presence: a vehicle is *added* when it has no prior record, *updated*
//! when it has one and produced a fresh record, and *removed* when it had
//! one and produced none.  The three sets are disjoint by construction.

use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use fed_bridge::sample::{
    InductionLoopSample, LaneAreaSample, Neighbor, SignalGroupSample, StepSample,
    VehicleContextSample, VehicleSample,
};
use fed_core::vehicle::{
    Consumptions, Emissions, StopMode, SurroundingVehicle, VehicleConsumptions, VehicleData,
    VehicleEmissions, VehicleSensors, VehicleSignals,
};
use fed_core::{
    DetectorId, InductionLoopInfo, LaneAreaInfo, RoadPosition, SignalGroupInfo, SignalState,
    SimTime, VehicleId,
};

use crate::flow::FlowTracker;

// ── Output batches ────────────────────────────────────────────────────────────

/// Movements of simulator-owned vehicles over one step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VehicleMovements {
    pub time: SimTime,
    /// Vehicles that entered the simulation this step.
    pub added: Vec<VehicleData>,
    /// Vehicles already present, with refreshed state.
    pub updated: Vec<VehicleData>,
    /// Vehicles that left the simulation this step.
    pub removed: Vec<VehicleId>,
    /// When the next movement batch will be published.
    pub next_update: SimTime,
}

impl VehicleMovements {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Everything one step produced, ready for publication.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepOutput {
    pub movements: VehicleMovements,
    pub induction_loops: Vec<InductionLoopInfo>,
    pub lane_areas: Vec<LaneAreaInfo>,
    pub signal_groups: Vec<SignalGroupInfo>,
}

impl StepOutput {
    fn empty(time: SimTime, next_update: SimTime) -> StepOutput {
        StepOutput {
            movements: VehicleMovements { time, next_update, ..Default::default() },
            ..Default::default()
        }
    }
}

// ── Sample disposition ────────────────────────────────────────────────────────

/// How one raw vehicle sample is to be treated.
#[derive(Clone, Debug, PartialEq)]
enum SampleDisposition {
    /// A regular sample: build a full record from it.
    Owned(VehicleSample),
    /// The vehicle is parked, or waiting inside a parking area without a
    /// valid position: the previous record is carried forward with the
    /// given stop mode.
    ParkedCarryForward(VehicleId, StopMode),
    /// Invalid position on a vehicle never seen before: nothing to publish.
    InvalidSkip(VehicleId),
    /// First seen already in a parked state: nothing to publish until the
    /// vehicle starts driving.
    ParkedInsertionSkip(VehicleId),
    /// Invalid position on a vehicle that was driving: treat as removed.
    AnomalousRemoval(VehicleId),
}

fn classify(sample: VehicleSample, prior: Option<&VehicleData>) -> SampleDisposition {
    if sample.position.is_none() {
        return match prior {
            // a vehicle leaving a parking area onto an occupied lane loses
            // its position until the lane is free; it counts as still parked
            Some(prev) if prev.stop_mode.is_parking() => {
                SampleDisposition::ParkedCarryForward(sample.id, prev.stop_mode)
            }
            Some(_) => SampleDisposition::AnomalousRemoval(sample.id),
            None => SampleDisposition::InvalidSkip(sample.id),
        };
    }
    let stop_mode = StopMode::decode(sample.stopped_state_encoded);
    if stop_mode.is_parking() {
        return match prior {
            Some(_) => SampleDisposition::ParkedCarryForward(sample.id, stop_mode),
            None => SampleDisposition::ParkedInsertionSkip(sample.id),
        };
    }
    SampleDisposition::Owned(sample)
}

// ── Distance-sensor configuration ─────────────────────────────────────────────

/// Lookahead ranges of a vehicle's activated distance sensors, in metres.
/// `None` means the sensor in that direction is disabled.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SensorRanges {
    pub front: Option<f64>,
    pub rear: Option<f64>,
}

/// One vehicle's leader/follower subscription results, collected while
/// building records and consumed by the sensor pass.
struct NeighborReading {
    vehicle: VehicleId,
    leader: Option<Neighbor>,
    follower: Option<Neighbor>,
    min_gap: f64,
}

// ── StepResultBuilder ─────────────────────────────────────────────────────────

/// Builds one [`StepOutput`] per simulator step.
pub struct StepResultBuilder {
    /// Publication interval; also the emission-rate scaling factor.
    interval: SimTime,
    /// Last published record per vehicle.
    records: FxHashMap<VehicleId, VehicleData>,
    /// Activated distance sensors per vehicle.
    sensors: FxHashMap<VehicleId, SensorRanges>,
    /// Flow aggregation per induction loop.
    flows: FxHashMap<DetectorId, FlowTracker>,
    flow_window: SimTime,
}

impl StepResultBuilder {
    pub fn new(interval: SimTime, flow_window: SimTime) -> StepResultBuilder {
        StepResultBuilder {
            interval,
            records: FxHashMap::default(),
            sensors: FxHashMap::default(),
            flows: FxHashMap::default(),
            flow_window,
        }
    }

    /// The last record published for `vehicle`, if it is still present.
    pub fn last_known(&self, vehicle: &VehicleId) -> Option<&VehicleData> {
        self.records.get(vehicle)
    }

    /// Activate distance sensors for a vehicle.  Takes effect with the next
    /// built step.
    pub fn configure_distance_sensors(&mut self, vehicle: VehicleId, ranges: SensorRanges) {
        self.sensors.insert(vehicle, ranges);
    }

    /// Consume one step's raw samples and produce the publication batches.
    ///
    /// `time` is the step's grant time; `next_update` is stamped into the
    /// movement batch so subscribers know when to expect the next one.
    pub fn build(
        &mut self,
        time: SimTime,
        next_update: SimTime,
        samples: Vec<StepSample>,
    ) -> StepOutput {
        let mut output = StepOutput::empty(time, next_update);
        let mut fresh: FxHashMap<VehicleId, VehicleData> = FxHashMap::default();
        let mut order: Vec<VehicleId> = Vec::new();
        let mut readings: Vec<NeighborReading> = Vec::new();
        let mut lane_areas: Vec<LaneAreaSample> = Vec::new();
        let mut loops: Vec<InductionLoopSample> = Vec::new();
        let mut signals: Vec<SignalGroupSample> = Vec::new();
        let mut contexts: Vec<VehicleContextSample> = Vec::new();

        for sample in samples {
            match sample {
                StepSample::Vehicle(v) => {
                    self.dispose_vehicle_sample(time, v, &mut fresh, &mut order, &mut readings);
                }
                StepSample::InductionLoop(s) => loops.push(s),
                StepSample::LaneArea(s) => lane_areas.push(s),
                StepSample::SignalGroup(s) => signals.push(s),
                StepSample::VehicleContext(s) => contexts.push(s),
            }
        }

        attribute_lane_areas(&lane_areas, &mut fresh, &mut output);
        self.derive_sensors(&readings, &mut fresh);
        merge_contexts(contexts, &mut fresh);

        // ── Movement classification ───────────────────────────────────────
        for id in self.records.keys() {
            if !fresh.contains_key(id) {
                output.movements.removed.push(id.clone());
            }
        }
        for id in order {
            let Some(data) = fresh.get(&id) else { continue };
            if self.records.contains_key(&id) {
                output.movements.updated.push(data.clone());
            } else {
                output.movements.added.push(data.clone());
            }
        }
        for removed in &output.movements.removed {
            self.sensors.remove(removed);
        }
        self.records = fresh;

        // ── Detector aggregation ──────────────────────────────────────────
        for s in loops {
            let tracker = self
                .flows
                .entry(s.id.clone())
                .or_insert_with(|| FlowTracker::new(self.flow_window));
            tracker.record(time, s.passed_vehicles);
            output.induction_loops.push(InductionLoopInfo {
                flow_veh_per_hour: tracker.flow_veh_per_hour(time),
                id: s.id,
                mean_speed: s.mean_speed,
                mean_vehicle_length: s.mean_vehicle_length,
            });
        }
        for s in signals {
            output.signal_groups.push(SignalGroupInfo {
                id: s.id,
                program_id: s.program_id,
                phase_index: s.phase_index,
                next_switch: SimTime((s.next_switch_s.max(0.0) * 1e9) as u64),
                states: SignalState::decode_all(&s.states),
            });
        }

        output
    }

    // ── Record construction ───────────────────────────────────────────────

    fn dispose_vehicle_sample(
        &self,
        time: SimTime,
        sample: VehicleSample,
        fresh: &mut FxHashMap<VehicleId, VehicleData>,
        order: &mut Vec<VehicleId>,
        readings: &mut Vec<NeighborReading>,
    ) {
        let prior = self.records.get(&sample.id);
        match classify(sample, prior) {
            SampleDisposition::Owned(sample) => {
                if self.sensors.contains_key(&sample.id) {
                    readings.push(NeighborReading {
                        vehicle: sample.id.clone(),
                        leader: sample.leader.clone(),
                        follower: sample.follower.clone(),
                        min_gap: sample.min_gap,
                    });
                }
                let record = self.build_record(time, &sample, prior);
                order.push(sample.id.clone());
                fresh.insert(sample.id, record);
            }
            SampleDisposition::ParkedCarryForward(id, stop_mode) => {
                // classify only yields this variant when a prior record exists
                if let Some(prev) = self.records.get(&id) {
                    if prev.stop_mode.is_parking() {
                        debug!(vehicle = %id, "still parked, carrying previous state forward");
                    } else {
                        info!(vehicle = %id, "vehicle has parked, keeping its last road position");
                    }
                    let mut record = prev.clone();
                    record.time = time;
                    record.speed = 0.0;
                    record.acceleration = 0.0;
                    record.stop_mode = stop_mode;
                    record.consumptions.current = Consumptions::default();
                    record.emissions.current = Emissions::default();
                    record.sensors = None;
                    record.lane_area = None;
                    record.vehicles_in_sight = Vec::new();
                    order.push(id.clone());
                    fresh.insert(id, record);
                }
            }
            SampleDisposition::InvalidSkip(id) => {
                debug!(vehicle = %id, "ignoring sample without valid position for unknown vehicle");
            }
            SampleDisposition::ParkedInsertionSkip(id) => {
                warn!(vehicle = %id, "skipping vehicle which entered the simulation already parked");
            }
            SampleDisposition::AnomalousRemoval(id) => {
                warn!(vehicle = %id, "vehicle lost its position unexpectedly, treating as removed");
            }
        }
    }

    fn build_record(
        &self,
        time: SimTime,
        sample: &VehicleSample,
        prior: Option<&VehicleData>,
    ) -> VehicleData {
        let step_s = self.interval.as_seconds_f64();

        let road = match &sample.edge {
            Some(edge) if !edge.is_internal() => Some(RoadPosition {
                connection: edge.clone(),
                lane_index: sample.lane_index,
                offset: sample.lane_position,
                lateral: sample.lateral_lane_position,
            }),
            // internal junction edges report no usable road position; the
            // last position on a regular edge is kept
            _ => prior.and_then(|p| p.road.clone()),
        };

        // The odometer reads negative until the simulator has initialized it.
        let distance_driven = if sample.distance_driven < 0.0 {
            prior.map_or(0.0, |p| p.distance_driven)
        } else {
            sample.distance_driven
        };

        let current_consumptions = Consumptions { fuel: sample.fuel * step_s };
        let current_emissions = Emissions {
            co2: sample.co2 * step_s,
            co: sample.co * step_s,
            hc: sample.hc * step_s,
            pmx: sample.pmx * step_s,
            nox: sample.nox * step_s,
        };

        VehicleData {
            time,
            id: sample.id.clone(),
            position: sample.position,
            road,
            speed: sample.speed,
            acceleration: prior.map_or(0.0, |p| (sample.speed - p.speed) / step_s),
            distance_driven,
            heading: sample.heading,
            slope: sample.slope,
            route_id: sample.route_id.clone(),
            signals: VehicleSignals::decode(sample.signals_encoded),
            stop_mode: StopMode::decode(sample.stopped_state_encoded),
            consumptions: VehicleConsumptions {
                current: current_consumptions,
                total: prior
                    .map_or(Consumptions::default(), |p| p.consumptions.total)
                    .accumulate(current_consumptions),
            },
            emissions: VehicleEmissions {
                current: current_emissions,
                total: prior
                    .map_or(Emissions::default(), |p| p.emissions.total)
                    .accumulate(current_emissions),
            },
            sensors: None,
            lane_area: None,
            vehicles_in_sight: Vec::new(),
        }
    }

    fn derive_sensors(
        &self,
        readings: &[NeighborReading],
        fresh: &mut FxHashMap<VehicleId, VehicleData>,
    ) {
        // Baseline: enabled sensors see nothing, disabled sensors read -1.
        for (vehicle, ranges) in &self.sensors {
            if let Some(record) = fresh.get_mut(vehicle) {
                record.sensors = Some(VehicleSensors {
                    front_distance: if ranges.front.is_some() { f64::INFINITY } else { -1.0 },
                    rear_distance: if ranges.rear.is_some() { f64::INFINITY } else { -1.0 },
                    leader_speed: if ranges.front.is_some() { f64::INFINITY } else { -1.0 },
                });
            }
        }

        for reading in readings {
            let Some(ranges) = self.sensors.get(&reading.vehicle) else { continue };

            // The lookahead gates on the net gap; the published reading is
            // grossed up by the vehicle's own min-gap.
            let mut front = None;
            if let (Some(range), Some(leader)) = (ranges.front, &reading.leader) {
                if leader.distance < range {
                    let leader_speed = fresh
                        .get(&leader.id)
                        .map(|l| l.speed)
                        .or_else(|| self.records.get(&leader.id).map(|l| l.speed))
                        .unwrap_or(-1.0);
                    front = Some((leader.distance + reading.min_gap, leader_speed));
                }
            }
            let mut rear = None;
            if let (Some(range), Some(follower)) = (ranges.rear, &reading.follower) {
                if follower.distance < range {
                    // the follower's min-gap is not subscribed, so the own
                    // one has to do
                    rear = Some(follower.distance + reading.min_gap);
                }
            }

            let Some(sensors) =
                fresh.get_mut(&reading.vehicle).and_then(|r| r.sensors.as_mut())
            else {
                continue;
            };
            if let Some((distance, speed)) = front {
                sensors.front_distance = distance;
                sensors.leader_speed = speed;
            }
            if let Some(distance) = rear {
                sensors.rear_distance = distance;
            }
        }
    }
}

fn attribute_lane_areas(
    samples: &[LaneAreaSample],
    fresh: &mut FxHashMap<VehicleId, VehicleData>,
    output: &mut StepOutput,
) {
    for s in samples {
        for vehicle in &s.vehicles {
            if let Some(record) = fresh.get_mut(vehicle) {
                // first detector containing the vehicle wins
                if record.lane_area.is_none() {
                    record.lane_area = Some(s.id.clone());
                }
            }
        }
        output.lane_areas.push(LaneAreaInfo {
            id: s.id.clone(),
            length: s.length,
            vehicle_count: s.vehicle_count,
            halting_vehicles: s.halting_vehicles,
            mean_speed: s.mean_speed,
            density_veh_per_km: LaneAreaInfo::density(s.vehicle_count, s.length),
            vehicles: s.vehicles.clone(),
        });
    }
}

fn merge_contexts(
    contexts: Vec<VehicleContextSample>,
    fresh: &mut FxHashMap<VehicleId, VehicleData>,
) {
    for context in contexts {
        if let Some(record) = fresh.get_mut(&context.id) {
            record.vehicles_in_sight = context
                .seen
                .into_iter()
                .map(|s| SurroundingVehicle { id: s.id, position: s.position, speed: s.speed })
                .collect();
        }
    }
}
