//! Vehicle lifecycle reconciliation.
//!
//! # Design
//!
//! One state-machine entry per vehicle id, covering both vehicles this
//! federate inserts and simulates, and externally-owned vehicles it only
//! mirrors:
//!
//! ```text
//!   registration ──► Pending ──(departure due, insert ok)──► Inserted
//!                       │ (insert fails, configured to continue)
//!                       └──► dropped
//!
//!   assignment to another federate ──► External{added: false}
//!        updates arrive ──(mirror-insert)──► External{added: true}
//!        owner removes  ──► dropped
//! ```
//!
//! Insertion is attempted exactly once per vehicle.  A failed attempt either
//! aborts the federation or drops the vehicle, depending on
//! `exit_on_insertion_error`; it is never retried.

use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use fed_bridge::{DepartLane, DepartSpeed, SimulatorBridge};
use fed_core::vehicle::{VehicleClass, VehicleData, VehicleType};
use fed_core::{
    FederateConfig, PositionSyncMode, RouteId, SimTime, VehicleId, VehicleRoute, VehicleTypeId,
};
use fed_step::VehicleMovements;

use crate::error::{FederateError, FederateResult};
use crate::interaction::{LaneSelection, SpeedSelection, VehicleRegistration};
use crate::routes::RouteCache;

/// Two vehicle-type parameters closer than this are considered equal and no
/// per-vehicle override is pushed to the simulator.
const TYPE_EPSILON: f64 = 1e-4;

/// Fallback simulator type for mirrored vehicles whose registration never
/// reached this federate.
const DEFAULT_EXTERNAL_TYPE: &str = "DEFAULT_VEHTYPE";

// ── Per-vehicle state ─────────────────────────────────────────────────────────

/// A vehicle simulated elsewhere and mirrored into the local simulator.
#[derive(Default)]
struct ExternalVehicle {
    /// Whether the mirror has been inserted into the local simulator.
    added: bool,
    /// Latest movement received from the owning federate.
    last: Option<VehicleData>,
    /// Type from the vehicle's registration, when one was seen.
    type_id: Option<VehicleTypeId>,
}

enum VehicleState {
    /// Registered, waiting for its departure time.
    Pending(Box<VehicleRegistration>),
    /// Inserted into the local simulator and owned by this federate.
    Inserted,
    /// Owned by another federate.
    External(ExternalVehicle),
}

struct PendingSubscription {
    vehicle: VehicleId,
    due: SimTime,
}

// ── LifecycleReconciler ───────────────────────────────────────────────────────

/// Reconciles registered, inserted, and externally-owned vehicles against
/// the local simulator.
pub struct LifecycleReconciler {
    subscribe_all: bool,
    exit_on_insertion_error: bool,
    time_gap_offset: f64,
    step_length_s: f64,
    sync_mode: PositionSyncMode,
    states: FxHashMap<VehicleId, VehicleState>,
    pending_subscriptions: Vec<PendingSubscription>,
    base_types: FxHashMap<VehicleTypeId, VehicleType>,
}

impl LifecycleReconciler {
    pub fn new(config: &FederateConfig) -> LifecycleReconciler {
        LifecycleReconciler {
            subscribe_all: config.subscribe_to_all_vehicles,
            exit_on_insertion_error: config.exit_on_insertion_error,
            time_gap_offset: config.time_gap_offset,
            step_length_s: config.update_interval().as_seconds_f64(),
            sync_mode: config.position_sync_mode,
            states: FxHashMap::default(),
            pending_subscriptions: Vec::new(),
            base_types: FxHashMap::default(),
        }
    }

    /// Store the scenario's vehicle types; per-vehicle deviations are
    /// diffed against these after insertion.
    pub fn declare_types(&mut self, types: Vec<VehicleType>) {
        for t in types {
            self.base_types.insert(t.id.clone(), t);
        }
    }

    /// Handle a vehicle registration.
    pub fn register_vehicle(&mut self, registration: VehicleRegistration) {
        match self.states.get_mut(&registration.vehicle) {
            Some(VehicleState::External(ext)) => {
                // the owner inserts it; remember the type for the mirror
                ext.type_id = Some(registration.vehicle_type.id.clone());
                debug!(vehicle = %registration.vehicle, "registration for externally-owned vehicle");
            }
            Some(_) => {
                warn!(vehicle = %registration.vehicle, "duplicate registration ignored");
            }
            None => {
                if self.subscribe_all || registration.has_applications {
                    self.pending_subscriptions.push(PendingSubscription {
                        vehicle: registration.vehicle.clone(),
                        due: registration.departure.time,
                    });
                }
                self.states.insert(
                    registration.vehicle.clone(),
                    VehicleState::Pending(Box::new(registration)),
                );
            }
        }
    }

    /// Mark a vehicle as owned by another federate.
    pub fn mark_external(&mut self, vehicle: VehicleId) {
        if let Some(VehicleState::Pending(_)) = self.states.get(&vehicle) {
            warn!(vehicle = %vehicle, "pending vehicle re-assigned to another federate");
            self.pending_subscriptions.retain(|p| p.vehicle != vehicle);
        }
        self.states
            .insert(vehicle, VehicleState::External(ExternalVehicle::default()));
    }

    pub fn is_external(&self, vehicle: &VehicleId) -> bool {
        matches!(self.states.get(vehicle), Some(VehicleState::External(_)))
    }

    pub fn is_pending(&self, vehicle: &VehicleId) -> bool {
        matches!(self.states.get(vehicle), Some(VehicleState::Pending(_)))
    }

    pub fn is_inserted(&self, vehicle: &VehicleId) -> bool {
        matches!(self.states.get(vehicle), Some(VehicleState::Inserted))
    }

    /// Ids of every vehicle this federate inserted and still owns.
    pub fn inserted_vehicles(&self) -> Vec<VehicleId> {
        self.states
            .iter()
            .filter(|(_, s)| matches!(s, VehicleState::Inserted))
            .map(|(id, _)| id.clone())
            .collect()
    }

    // ── Insertion ─────────────────────────────────────────────────────────

    /// Insert every pending vehicle whose departure time has been reached.
    pub fn flush_insertions<B: SimulatorBridge>(
        &mut self,
        time: SimTime,
        bridge: &mut B,
        routes: &mut RouteCache,
    ) -> FederateResult<()> {
        let due: Vec<VehicleId> = self
            .states
            .iter()
            .filter_map(|(id, state)| match state {
                VehicleState::Pending(reg) if reg.departure.time <= time => Some(id.clone()),
                _ => None,
            })
            .collect();

        for id in due {
            let Some(VehicleState::Pending(registration)) = self.states.remove(&id) else {
                continue;
            };
            match self.try_insert(&registration, bridge, routes) {
                Ok(()) => {
                    info!(vehicle = %id, time = %time, "vehicle inserted");
                    self.states.insert(id, VehicleState::Inserted);
                }
                Err(e) if self.exit_on_insertion_error => {
                    return Err(FederateError::Insertion {
                        vehicle: id,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(vehicle = %id, error = %e, "insertion failed, dropping vehicle");
                    self.pending_subscriptions.retain(|p| p.vehicle != id);
                }
            }
        }
        Ok(())
    }

    fn try_insert<B: SimulatorBridge>(
        &self,
        registration: &VehicleRegistration,
        bridge: &mut B,
        routes: &mut RouteCache,
    ) -> FederateResult<()> {
        let departure = &registration.departure;

        // Departures from a later connection drive on a suffix of the route.
        let route_id = if departure.connection_index > 0 {
            let (route, created) = routes.cut_route(&departure.route, departure.connection_index)?;
            if created {
                bridge.add_route(&route)?;
            }
            route.id
        } else {
            if !routes.contains(&departure.route) {
                return Err(FederateError::MissingRoute(departure.route.clone()));
            }
            departure.route.clone()
        };

        let lane = resolve_lane(departure.lane, registration.vehicle_type.vehicle_class);
        let speed = match departure.speed {
            SpeedSelection::Precise(v) => DepartSpeed::Precise(v),
            SpeedSelection::Random => DepartSpeed::Random,
            SpeedSelection::Maximum => DepartSpeed::Maximum,
        };

        bridge.add_vehicle(
            &registration.vehicle,
            &route_id,
            &registration.vehicle_type.id,
            lane,
            departure.position,
            speed,
        )?;

        self.apply_type_deviations(&registration.vehicle, &registration.vehicle_type, bridge)?;
        Ok(())
    }

    /// Push per-vehicle deviations from the declared base type.
    fn apply_type_deviations<B: SimulatorBridge>(
        &self,
        vehicle: &VehicleId,
        actual: &VehicleType,
        bridge: &mut B,
    ) -> FederateResult<()> {
        let Some(base) = self.base_types.get(&actual.id) else {
            warn!(vehicle = %vehicle, vehicle_type = %actual.id, "vehicle type was never declared, skipping deviation check");
            return Ok(());
        };
        let differs = |a: f64, b: f64| (a - b).abs() > TYPE_EPSILON;

        if differs(actual.length, base.length) {
            bridge.set_vehicle_length(vehicle, actual.length)?;
        }
        if differs(actual.min_gap, base.min_gap) {
            bridge.set_minimum_gap(vehicle, actual.min_gap)?;
        }
        if differs(actual.max_speed, base.max_speed) {
            bridge.set_max_speed(vehicle, actual.max_speed)?;
        }
        if differs(actual.max_acceleration, base.max_acceleration) {
            bridge.set_max_acceleration(vehicle, actual.max_acceleration)?;
        }
        if differs(actual.max_deceleration, base.max_deceleration) {
            bridge.set_max_deceleration(vehicle, actual.max_deceleration)?;
        }
        if differs(actual.speed_factor, base.speed_factor) {
            bridge.set_speed_factor(vehicle, actual.speed_factor)?;
        }
        if differs(actual.sigma, base.sigma) {
            bridge.set_imperfection(vehicle, actual.sigma)?;
        }
        // Reaction times carry the configured offset and are floored at one
        // step length: the simulator cannot react faster than it steps.
        let effective_base = self.effective_reaction_time(base.reaction_time);
        let effective_actual = self.effective_reaction_time(actual.reaction_time);
        if differs(effective_actual, effective_base) {
            bridge.set_reaction_time(vehicle, effective_actual)?;
        }
        if actual.color != base.color {
            if let Some(color) = &actual.color {
                bridge.set_color(vehicle, color)?;
            }
        }
        Ok(())
    }

    pub fn effective_reaction_time(&self, tau: f64) -> f64 {
        (tau + self.time_gap_offset).max(self.step_length_s)
    }

    // ── Subscriptions ─────────────────────────────────────────────────────

    /// Subscribe every due vehicle.  A failed subscription is logged and the
    /// vehicle continues unsubscribed; it is never retried.
    pub fn flush_subscriptions<B: SimulatorBridge>(
        &mut self,
        time: SimTime,
        end_time: SimTime,
        bridge: &mut B,
    ) {
        let mut remaining = Vec::with_capacity(self.pending_subscriptions.len());
        for pending in self.pending_subscriptions.drain(..) {
            if pending.due > time {
                remaining.push(pending);
                continue;
            }
            match self.states.get(&pending.vehicle) {
                Some(VehicleState::Inserted) => {
                    if let Err(e) = bridge.subscribe_vehicle(&pending.vehicle, time, end_time) {
                        warn!(vehicle = %pending.vehicle, error = %e, "subscription failed, vehicle continues unsubscribed");
                    }
                }
                Some(VehicleState::External(_)) | None => {
                    // dropped or re-assigned since registration
                    debug!(vehicle = %pending.vehicle, "skipping subscription");
                }
                Some(VehicleState::Pending(_)) => remaining.push(pending),
            }
        }
        self.pending_subscriptions = remaining;
    }

    // ── External vehicles ─────────────────────────────────────────────────

    /// Fold another federate's movement batch into the mirror states.
    pub fn apply_external_updates<B: SimulatorBridge>(
        &mut self,
        movements: &VehicleMovements,
        bridge: &mut B,
    ) {
        for data in movements.added.iter().chain(&movements.updated) {
            match self.states.get_mut(&data.id) {
                Some(VehicleState::External(ext)) => ext.last = Some(data.clone()),
                None => {
                    self.states.insert(
                        data.id.clone(),
                        VehicleState::External(ExternalVehicle {
                            added: false,
                            last: Some(data.clone()),
                            type_id: None,
                        }),
                    );
                }
                Some(_) => {
                    warn!(vehicle = %data.id, "movement update for a vehicle this federate owns, ignoring");
                }
            }
        }
        for id in &movements.removed {
            if let Some(VehicleState::External(ext)) = self.states.get(id) {
                if ext.added {
                    if let Err(e) = bridge.remove_vehicle(id) {
                        warn!(vehicle = %id, error = %e, "could not remove mirrored vehicle");
                    }
                }
                self.states.remove(id);
            }
        }
    }

    /// Bring every mirrored vehicle up to its latest known position.  Runs
    /// immediately before each simulator step.
    pub fn sync_external<B: SimulatorBridge>(&mut self, bridge: &mut B) {
        for (id, state) in self.states.iter_mut() {
            let VehicleState::External(ext) = state else { continue };
            let Some(last) = &ext.last else { continue };
            let Some(position) = last.position else { continue };

            if !ext.added {
                // mirror-insert on a single-edge route at the vehicle's
                // current connection
                let Some(road) = &last.road else {
                    debug!(vehicle = %id, "no road position yet, delaying mirror insertion");
                    continue;
                };
                let route = VehicleRoute {
                    id: RouteId::new(format!("external_{id}")),
                    edges: vec![road.connection.clone()],
                };
                let type_id = ext
                    .type_id
                    .clone()
                    .unwrap_or_else(|| VehicleTypeId::new(DEFAULT_EXTERNAL_TYPE));
                let inserted = bridge
                    .add_route(&route)
                    .and_then(|()| {
                        bridge.add_vehicle(
                            id,
                            &route.id,
                            &type_id,
                            DepartLane::Free,
                            0.0,
                            DepartSpeed::Precise(0.0),
                        )
                    });
                match inserted {
                    Ok(()) => {
                        info!(vehicle = %id, "mirrored external vehicle into local simulator");
                        ext.added = true;
                    }
                    Err(e) => {
                        warn!(vehicle = %id, error = %e, "could not mirror external vehicle");
                        continue;
                    }
                }
            }

            if let Err(e) = bridge.move_to(id, position, last.heading, self.sync_mode) {
                warn!(vehicle = %id, error = %e, "could not update mirrored position");
            }
        }
    }

    /// Remove externally-owned vehicles from a movement batch before it is
    /// published: the owner publishes their movements.
    ///
    /// Removals are the exception: the id stays in `removed` so subscribers
    /// of this federate see the vehicle leave, while the mirror state is
    /// dropped here.
    pub fn strip_external(&mut self, movements: &mut VehicleMovements) {
        let states = &self.states;
        let external =
            |id: &VehicleId| matches!(states.get(id), Some(VehicleState::External(_)));
        movements.added.retain(|v| !external(&v.id));
        movements.updated.retain(|v| !external(&v.id));

        let removed_external: Vec<VehicleId> = movements
            .removed
            .iter()
            .filter(|id| external(id))
            .cloned()
            .collect();
        for id in removed_external {
            self.states.remove(&id);
        }
    }
}

// ── Lane-policy resolution ────────────────────────────────────────────────────

fn resolve_lane(selection: LaneSelection, class: VehicleClass) -> DepartLane {
    match selection {
        LaneSelection::Random => DepartLane::Random,
        LaneSelection::Free => DepartLane::Free,
        LaneSelection::Allowed => DepartLane::Allowed,
        LaneSelection::Best => DepartLane::Best,
        LaneSelection::First => DepartLane::First,
        LaneSelection::Highway => {
            if class.is_heavy() {
                DepartLane::First
            } else {
                DepartLane::Best
            }
        }
        LaneSelection::Index(i) => DepartLane::Index(i),
    }
}
