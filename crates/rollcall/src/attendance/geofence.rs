use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use super::domain::{EventDefinition, EventId, GeofenceSpec, InvalidArgument};
use super::geo::{distance_meters, Coordinate};

/// Circular area an attendee must be inside to check in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub event_id: EventId,
    pub center: Coordinate,
    pub radius_meters: f32,
}

impl Geofence {
    pub fn new(
        event_id: EventId,
        center: Coordinate,
        radius_meters: f32,
    ) -> Result<Self, InvalidArgument> {
        if !(radius_meters.is_finite() && radius_meters > 0.0) {
            return Err(InvalidArgument::NonPositiveRadius(radius_meters));
        }
        center.validate()?;

        Ok(Self {
            event_id,
            center,
            radius_meters,
        })
    }

    /// Inclusive on the boundary.
    pub fn contains(&self, point: Coordinate) -> bool {
        distance_meters(self.center, point) <= f64::from(self.radius_meters)
    }
}

/// Membership answer for a point, distinguishing events that have no geofence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeofenceMatch {
    Inside,
    Outside,
    Unregistered,
}

/// Membership seam used by the admission coordinator.
pub trait GeofenceLookup: Send + Sync {
    fn is_within(&self, event_id: &EventId, point: Coordinate) -> bool;
}

/// In-memory geofence cache keyed by event; the event store stays the source of truth.
#[derive(Debug, Default)]
pub struct GeofenceRegistry {
    fences: Mutex<HashMap<EventId, Geofence>>,
    allow_when_unregistered: bool,
}

impl GeofenceRegistry {
    pub fn new(allow_when_unregistered: bool) -> Self {
        Self {
            fences: Mutex::new(HashMap::new()),
            allow_when_unregistered,
        }
    }

    // Every critical section is a single map operation; a poisoned map is still consistent.
    fn fences(&self) -> MutexGuard<'_, HashMap<EventId, Geofence>> {
        self.fences.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upserts the geofence for `event_id`.
    pub fn register(
        &self,
        event_id: EventId,
        center: Coordinate,
        radius_meters: f32,
    ) -> Result<(), InvalidArgument> {
        let fence = Geofence::new(event_id.clone(), center, radius_meters)?;
        self.fences().insert(event_id, fence);
        Ok(())
    }

    /// Idempotent.
    pub fn unregister(&self, event_id: &EventId) {
        self.fences().remove(event_id);
    }

    pub fn get(&self, event_id: &EventId) -> Option<Geofence> {
        self.fences().get(event_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.fences().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn allows_unregistered(&self) -> bool {
        self.allow_when_unregistered
    }

    pub fn lookup(&self, event_id: &EventId, point: Coordinate) -> GeofenceMatch {
        // Clone out so the distance math runs without the lock held.
        let fence = self.get(event_id);
        match fence {
            Some(fence) if fence.contains(point) => GeofenceMatch::Inside,
            Some(_) => GeofenceMatch::Outside,
            None => GeofenceMatch::Unregistered,
        }
    }

    /// `true` when the point lies inside the event's geofence. Events with no
    /// geofence follow the registry's `allow_when_unregistered` setting.
    pub fn is_within(&self, event_id: &EventId, point: Coordinate) -> bool {
        match self.lookup(event_id, point) {
            GeofenceMatch::Inside => true,
            GeofenceMatch::Outside => false,
            GeofenceMatch::Unregistered => self.allow_when_unregistered,
        }
    }

    /// Registers or removes the geofence stored on an event definition.
    pub fn apply_event(&self, event: &EventDefinition) -> Result<(), InvalidArgument> {
        match event.geofence {
            Some(GeofenceSpec {
                center,
                radius_meters,
            }) => self.register(event.event_id.clone(), center, radius_meters),
            None => {
                self.unregister(&event.event_id);
                Ok(())
            }
        }
    }

    /// Replaces the registry contents with the geofences of `events`.
    pub fn sync<'a, I>(&self, events: I) -> Result<usize, InvalidArgument>
    where
        I: IntoIterator<Item = &'a EventDefinition>,
    {
        let mut next = HashMap::new();
        for event in events {
            if let Some(spec) = event.geofence {
                let fence =
                    Geofence::new(event.event_id.clone(), spec.center, spec.radius_meters)?;
                next.insert(event.event_id.clone(), fence);
            }
        }

        let count = next.len();
        *self.fences() = next;
        Ok(count)
    }
}

impl GeofenceLookup for GeofenceRegistry {
    fn is_within(&self, event_id: &EventId, point: Coordinate) -> bool {
        GeofenceRegistry::is_within(self, event_id, point)
    }
}
