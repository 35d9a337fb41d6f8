//! The federate ambassador: grant-driven coordination of the simulator.
//!
//! # Design
//!
//! The coordination runtime drives everything through time-advance grants.
//! One grant at or past the next scheduled step triggers the full cycle:
//!
//! 1. dispatch buffered interactions (arrival order),
//! 2. on the first such grant, connect and register static infrastructure,
//! 3. insert due vehicles and subscribe them,
//! 4. fire deferred effects, recompute lane preferences if flagged,
//!    re-position mirrored vehicles,
//! 5. step the simulator,
//! 6. assemble, filter, and publish the result batches,
//! 7. request the next grant.
//!
//! Grants earlier than the next scheduled step only dispatch interactions.
//! The sink is a parameter of grant processing, never owned state.

use tracing::{debug, info, warn};

use fed_bridge::{
    connect_with_retry, BridgeError, Connector, PoiControl, RetryPolicy, RouteControl,
    SimulationControl, SimulatorBridge, VehicleControl,
};
use fed_core::{
    FederateConfig, FederateId, Highlight, SignalGroupInfo, SignalState, SimTime, StopMode,
    VehicleClass, VehicleId, VehicleRoute,
};
use fed_step::{SensorRanges, StepResultBuilder};

use crate::buffer::InteractionBuffer;
use crate::context::RtiSink;
use crate::deferred::{DeferredEffect, DeferredEventScheduler};
use crate::error::{FederateError, FederateResult};
use crate::interaction::{
    Interaction, LaneChangeTarget, Outbound, SignalCommand, SpeedChange, TrafficSign,
    VehicleParameter,
};
use crate::lifecycle::LifecycleReconciler;
use crate::routes::{CacheOutcome, RouteCache};

/// Drives one external traffic simulator on behalf of the federation.
pub struct FederateAmbassador<C: Connector> {
    config: FederateConfig,
    federate_id: FederateId,
    connector: C,
    /// Established on the first stepping grant.
    bridge: Option<C::Bridge>,
    buffer: InteractionBuffer,
    lifecycle: LifecycleReconciler,
    routes: RouteCache,
    step: StepResultBuilder,
    deferred: DeferredEventScheduler,
    /// The next grant time at which the simulator steps.
    next_step: SimTime,
    end_time: SimTime,
    /// Set by lane-property changes; forces a best-lane recomputation for
    /// every owned vehicle before the next step.
    recompute_best_lanes: bool,
}

impl<C: Connector> FederateAmbassador<C>
where
    C::Bridge: SimulatorBridge,
{
    pub fn new(
        config: FederateConfig,
        federate_id: FederateId,
        connector: C,
        end_time: SimTime,
    ) -> FederateAmbassador<C> {
        let step = StepResultBuilder::new(
            config.update_interval(),
            SimTime::from_seconds(config.flow_measurement_window_s),
        );
        FederateAmbassador {
            lifecycle: LifecycleReconciler::new(&config),
            config,
            federate_id,
            connector,
            bridge: None,
            buffer: InteractionBuffer::new(),
            routes: RouteCache::new(),
            step,
            deferred: DeferredEventScheduler::new(),
            next_step: SimTime::ZERO,
            end_time,
            recompute_best_lanes: false,
        }
    }

    /// Handle onto the inbound buffer, for the runtime's delivery path.
    pub fn buffer(&self) -> InteractionBuffer {
        self.buffer.clone()
    }

    pub fn routes(&self) -> &RouteCache {
        &self.routes
    }

    pub fn lifecycle(&self) -> &LifecycleReconciler {
        &self.lifecycle
    }

    // ── Grant processing ──────────────────────────────────────────────────

    /// Process one time-advance grant.
    pub fn process_time_advance_grant<S: RtiSink>(
        &mut self,
        time: SimTime,
        sink: &mut S,
    ) -> FederateResult<()> {
        for interaction in self.buffer.drain() {
            if interaction.time() > time {
                return Err(FederateError::ProtocolViolation {
                    interaction_time: interaction.time(),
                    grant_time: time,
                });
            }
            debug!(kind = interaction.kind(), time = %interaction.time(), "dispatching interaction");
            self.dispatch(interaction, sink)?;
        }

        // Intermediate grants exist only to deliver interactions.
        if time < self.next_step {
            return Ok(());
        }

        if self.bridge.is_none() {
            self.initialize(sink)?;
        }
        let bridge = require_bridge(&mut self.bridge)?;

        self.lifecycle.flush_insertions(time, bridge, &mut self.routes)?;
        self.lifecycle.flush_subscriptions(time, self.end_time, bridge);

        for effect in self.deferred.drain_due(time) {
            match effect {
                DeferredEffect::SetSpeed { vehicle, speed } => {
                    if let Err(e) = bridge.set_speed(&vehicle, speed) {
                        warn!(vehicle = %vehicle, error = %e, "deferred speed change failed");
                    }
                }
            }
        }

        if self.recompute_best_lanes {
            for vehicle in self.lifecycle.inserted_vehicles() {
                if let Err(e) = bridge.update_best_lanes(&vehicle) {
                    warn!(vehicle = %vehicle, error = %e, "best-lane recomputation failed");
                }
            }
            self.recompute_best_lanes = false;
        }

        self.lifecycle.sync_external(bridge);

        let samples = bridge.simulate_until(time)?;
        let interval = self.config.update_interval();
        let mut output = self.step.build(time, time + interval, samples);
        self.lifecycle.strip_external(&mut output.movements);

        // Routes the simulator knows but the federation does not yet.
        for data in output.movements.added.iter().chain(&output.movements.updated) {
            let Some(route_id) = &data.route_id else { continue };
            if self.routes.contains(route_id) {
                continue;
            }
            let edges = bridge.route_edges(route_id)?;
            let route = VehicleRoute { id: route_id.clone(), edges };
            info!(route = %route.id, "propagating route discovered in the simulator");
            self.routes.insert(route.clone());
            sink.publish(Outbound::RouteRegistration(route));
        }

        sink.publish(Outbound::VehicleMovements(output.movements));
        if !output.induction_loops.is_empty() || !output.lane_areas.is_empty() {
            sink.publish(Outbound::DetectorUpdates {
                time,
                induction_loops: output.induction_loops,
                lane_areas: output.lane_areas,
            });
        }
        if !output.signal_groups.is_empty() {
            sink.publish(Outbound::SignalGroupUpdates { time, groups: output.signal_groups });
        }

        self.next_step = time + interval;
        sink.request_advance(self.next_step);
        Ok(())
    }

    /// First-grant initialization: connect, register signal infrastructure,
    /// take over the simulator's declared routes.
    fn initialize<S: RtiSink>(&mut self, sink: &mut S) -> FederateResult<()> {
        info!(federate = %self.federate_id, "connecting to traffic simulator");
        let mut bridge =
            connect_with_retry(&mut self.connector, RetryPolicy::from_config(&self.config))?;

        let groups = bridge.signal_group_ids()?;
        let mut definitions = Vec::with_capacity(groups.len());
        for group in groups {
            match bridge.signal_group_definition(&group) {
                Ok(definition) => definitions.push(definition),
                Err(e) => {
                    warn!(group = %group, error = %e, "could not read signal group, skipping it");
                }
            }
        }
        if !definitions.is_empty() {
            info!(count = definitions.len(), "registering signal groups");
            sink.publish(Outbound::SignalGroupRegistration(definitions));
        }

        for id in bridge.route_ids()? {
            let edges = bridge.route_edges(&id)?;
            self.routes.insert(VehicleRoute { id, edges });
        }

        self.bridge = Some(bridge);
        Ok(())
    }

    // ── Interaction dispatch ──────────────────────────────────────────────

    fn dispatch<S: RtiSink>(
        &mut self,
        interaction: Interaction,
        sink: &mut S,
    ) -> FederateResult<()> {
        match interaction {
            Interaction::VehicleTypesInitialization { types, .. } => {
                self.lifecycle.declare_types(types);
            }
            Interaction::RoutesInitialization { routes, .. } => {
                for route in routes {
                    self.routes.insert(route);
                }
            }
            Interaction::RouteRegistration { route, .. } => {
                if self.routes.insert(route.clone()) == CacheOutcome::Inserted {
                    if let Some(bridge) = self.bridge.as_mut() {
                        bridge.add_route(&route)?;
                    }
                }
            }
            Interaction::VehicleRegistration(registration) => {
                self.lifecycle.register_vehicle(registration);
            }
            Interaction::VehicleFederateAssignment { vehicle, federate, .. } => {
                if federate != self.federate_id {
                    self.lifecycle.mark_external(vehicle);
                }
            }
            Interaction::VehicleUpdates { origin, movements, .. } => {
                if origin != self.federate_id {
                    let bridge = require_bridge(&mut self.bridge)?;
                    self.lifecycle.apply_external_updates(&movements, bridge);
                }
            }

            // ── Per-vehicle commands (skipped for mirrored vehicles) ─────
            Interaction::VehicleSlowDown { vehicle, speed, duration, .. } => {
                if self.skip_external(&vehicle) {
                    return Ok(());
                }
                require_bridge(&mut self.bridge)?.slow_down(&vehicle, speed, duration)?;
            }
            Interaction::VehicleSpeedChange { time, vehicle, change } => {
                if self.skip_external(&vehicle) {
                    return Ok(());
                }
                let bridge = require_bridge(&mut self.bridge)?;
                match change {
                    SpeedChange::Reset => bridge.set_speed(&vehicle, -1.0)?,
                    SpeedChange::Set { speed, ramp } if ramp > SimTime::ZERO => {
                        // ramp now, pin the final speed at the snapped step
                        bridge.slow_down(&vehicle, speed, ramp)?;
                        let due = (time + ramp).snap_to_grid(self.config.update_interval());
                        self.deferred
                            .schedule(due, DeferredEffect::SetSpeed { vehicle, speed });
                    }
                    SpeedChange::Set { speed, .. } => bridge.set_speed(&vehicle, speed)?,
                }
            }
            Interaction::VehicleLaneChange { vehicle, target, duration, .. } => {
                if self.skip_external(&vehicle) {
                    return Ok(());
                }
                let current = self
                    .step
                    .last_known(&vehicle)
                    .and_then(|d| d.road.as_ref())
                    .map(|r| r.lane_index);
                let target_index = match (target, current) {
                    (LaneChangeTarget::ByIndex(i), _) => i,
                    (LaneChangeTarget::ToRightmost, _) => 0,
                    (LaneChangeTarget::Stay, Some(c)) => c,
                    (LaneChangeTarget::ToLeft, Some(c)) => c + 1,
                    (LaneChangeTarget::ToRight, Some(c)) => c.saturating_sub(1),
                    (_, None) => {
                        warn!(vehicle = %vehicle, "current lane unknown, ignoring relative lane change");
                        return Ok(());
                    }
                };
                let bridge = require_bridge(&mut self.bridge)?;
                bridge.change_lane(&vehicle, target_index, duration)?;
                if self.config.highlight_enabled(Highlight::ChangeLane) {
                    if let Err(e) = bridge.highlight(&vehicle, "red") {
                        debug!(vehicle = %vehicle, error = %e, "highlight failed");
                    }
                }
            }
            Interaction::VehicleStop {
                vehicle,
                edge,
                position,
                lane_index,
                duration,
                mode,
                ..
            } => {
                if self.skip_external(&vehicle) {
                    return Ok(());
                }
                let bridge = require_bridge(&mut self.bridge)?;
                // Parking areas have their own placement; lane stops are
                // clamped into the lane's extent.
                let position = if mode == StopMode::ParkedParkingArea {
                    position
                } else {
                    match bridge.lane_length(&edge, lane_index) {
                        Ok(length) => position.clamp(0.1, length.max(0.1)),
                        Err(e) => {
                            warn!(edge = %edge, lane_index, error = %e, "lane length unknown, using requested stop position");
                            position
                        }
                    }
                };
                bridge.stop(&vehicle, &edge, position, lane_index, duration, mode.encode())?;
            }
            Interaction::VehicleResume { vehicle, .. } => {
                if self.skip_external(&vehicle) {
                    return Ok(());
                }
                require_bridge(&mut self.bridge)?.resume(&vehicle)?;
            }
            Interaction::VehicleRouteChange { vehicle, route, .. } => {
                if self.skip_external(&vehicle) {
                    return Ok(());
                }
                if !self.routes.contains(&route) {
                    warn!(vehicle = %vehicle, route = %route, "route change to unknown route ignored");
                    return Ok(());
                }
                let bridge = require_bridge(&mut self.bridge)?;
                bridge.set_route(&vehicle, &route)?;
                if self.config.highlight_enabled(Highlight::ChangeRoute) {
                    if let Err(e) = bridge.highlight(&vehicle, "blue") {
                        debug!(vehicle = %vehicle, error = %e, "highlight failed");
                    }
                }
            }
            Interaction::VehicleParameterChange { vehicle, parameters, .. } => {
                if self.skip_external(&vehicle) {
                    return Ok(());
                }
                let effective_tau =
                    |tau: f64| self.lifecycle.effective_reaction_time(tau);
                let bridge = require_bridge(&mut self.bridge)?;
                for parameter in parameters {
                    match parameter {
                        VehicleParameter::MaxSpeed(v) => bridge.set_max_speed(&vehicle, v)?,
                        VehicleParameter::MaxAcceleration(v) => {
                            bridge.set_max_acceleration(&vehicle, v)?
                        }
                        VehicleParameter::MaxDeceleration(v) => {
                            bridge.set_max_deceleration(&vehicle, v)?
                        }
                        VehicleParameter::MinimumGap(v) => bridge.set_minimum_gap(&vehicle, v)?,
                        VehicleParameter::ReactionTime(tau) => {
                            bridge.set_reaction_time(&vehicle, effective_tau(tau))?
                        }
                        VehicleParameter::SpeedFactor(v) => bridge.set_speed_factor(&vehicle, v)?,
                        VehicleParameter::Imperfection(v) => {
                            bridge.set_imperfection(&vehicle, v)?
                        }
                        VehicleParameter::SpeedMode(m) => bridge.set_speed_mode(&vehicle, m)?,
                        VehicleParameter::LaneChangeMode(m) => {
                            bridge.set_lane_change_mode(&vehicle, m)?
                        }
                        VehicleParameter::Color(c) => bridge.set_color(&vehicle, &c)?,
                    }
                }
            }
            Interaction::VehicleSensorActivation {
                vehicle,
                front_range,
                rear_range,
                ..
            } => {
                self.step.configure_distance_sensors(
                    vehicle,
                    SensorRanges { front: front_range, rear: rear_range },
                );
            }
            Interaction::VehicleSightDistanceConfiguration { time, vehicle, range_m } => {
                require_bridge(&mut self.bridge)?
                    .subscribe_field_of_vision(&vehicle, range_m, time, self.end_time)?;
            }

            // ── Infrastructure ────────────────────────────────────────────
            Interaction::InductionLoopSubscription { time, detector } => {
                require_bridge(&mut self.bridge)?
                    .subscribe_induction_loop(&detector, time, self.end_time)?;
            }
            Interaction::LaneAreaSubscription { time, detector } => {
                require_bridge(&mut self.bridge)?
                    .subscribe_lane_area(&detector, time, self.end_time)?;
            }
            Interaction::SignalGroupSubscription { time, group } => {
                require_bridge(&mut self.bridge)?
                    .subscribe_signal_group(&group, time, self.end_time)?;
            }
            Interaction::SignalStateChange { time, group, command } => {
                let bridge = require_bridge(&mut self.bridge)?;
                match command {
                    SignalCommand::Phase(index) => bridge.set_signal_phase(&group, index)?,
                    SignalCommand::Program(program) => {
                        bridge.set_signal_program(&group, &program)?
                    }
                    SignalCommand::RemainingDuration(duration) => {
                        bridge.set_signal_remaining_duration(&group, duration)?
                    }
                    SignalCommand::CustomState(states) => {
                        bridge.set_signal_custom_state(&group, &states)?
                    }
                }
                // publish the resulting state right away instead of waiting
                // for the next step
                let sample = bridge.signal_group_state(&group)?;
                sink.publish(Outbound::SignalGroupUpdates {
                    time,
                    groups: vec![SignalGroupInfo {
                        id: sample.id,
                        program_id: sample.program_id,
                        phase_index: sample.phase_index,
                        next_switch: SimTime((sample.next_switch_s.max(0.0) * 1e9) as u64),
                        states: SignalState::decode_all(&sample.states),
                    }],
                });
            }
            Interaction::LanePropertyChange {
                edge,
                lane_index,
                allowed,
                disallowed,
                max_speed,
                ..
            } => {
                let bridge = require_bridge(&mut self.bridge)?;
                if let Some(classes) = allowed {
                    let names: Vec<&str> =
                        classes.iter().map(|c| c.simulator_class()).collect();
                    bridge.set_lane_allowed_classes(&edge, lane_index, &names)?;
                }
                if let Some(classes) = disallowed {
                    if VehicleClass::ALL.iter().all(|c| classes.contains(c)) {
                        // banning every class is expressed as an empty allow-list
                        bridge.set_lane_allowed_classes(&edge, lane_index, &[])?;
                    } else {
                        let names: Vec<&str> =
                            classes.iter().map(|c| c.simulator_class()).collect();
                        bridge.set_lane_disallowed_classes(&edge, lane_index, &names)?;
                    }
                }
                if let Some(speed) = max_speed {
                    bridge.set_lane_max_speed(&edge, lane_index, speed)?;
                }
                self.recompute_best_lanes = true;
            }
            Interaction::TrafficSignRegistration { sign, .. } => {
                let bridge = require_bridge(&mut self.bridge)?;
                let result = match &sign {
                    TrafficSign::SpeedLimit { sign_id, position, speed } => {
                        bridge.add_speed_sign(sign_id, *position, *speed)
                    }
                    TrafficSign::LaneAssignment { sign_id, position, lanes } => {
                        bridge.add_lane_assignment_sign(sign_id, *position, lanes)
                    }
                };
                if let Err(e) = result {
                    warn!(error = %e, "could not draw traffic sign");
                }
            }
            Interaction::TrafficSignSpeedLimitChange { sign_id, speed, .. } => {
                if let Err(e) =
                    require_bridge(&mut self.bridge)?.set_variable_speed(&sign_id, speed)
                {
                    warn!(sign = %sign_id, error = %e, "could not update speed sign");
                }
            }
            Interaction::TrafficSignLaneAssignmentChange { sign_id, lanes, .. } => {
                if let Err(e) = require_bridge(&mut self.bridge)?
                    .set_variable_lane_assignment(&sign_id, &lanes)
                {
                    warn!(sign = %sign_id, error = %e, "could not update lane assignment sign");
                }
            }

            Interaction::RawCommand { request_id, payload, .. } => {
                let response = require_bridge(&mut self.bridge)?.execute_raw(&payload)?;
                sink.publish(Outbound::RawCommandResponse { request_id, payload: response });
            }
            Interaction::Foreign { type_id, .. } => {
                warn!(type_id = %type_id, "unknown interaction type, discarding");
            }
        }
        Ok(())
    }

    fn skip_external(&self, vehicle: &VehicleId) -> bool {
        if self.lifecycle.is_external(vehicle) {
            debug!(vehicle = %vehicle, "skipping command for externally-owned vehicle");
            true
        } else {
            false
        }
    }
}

fn require_bridge<B>(bridge: &mut Option<B>) -> FederateResult<&mut B> {
    bridge
        .as_mut()
        .ok_or_else(|| BridgeError::Connection("simulator connection not established yet".into()).into())
}
