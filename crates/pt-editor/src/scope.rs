//! Store access bound to the tour and location named by the current route.
//!
//! A scope never fails on a missing or malformed id: reads fall back to the
//! empty placeholder and writes become no-ops that return `None`/`false`.

use crate::store::TourStore;
use pt_client::TourBackend;
use pt_core::{LocationId, Overlay, OverlayAction, OverlayId, TourGraph, TourId, TourLocation};
use std::sync::Arc;

/// Ids taken from a route such as `/tour/:tour/location/:location`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteParams {
    pub tour_id: Option<TourId>,
    pub location_id: Option<LocationId>,
}

impl RouteParams {
    /// Parse raw route segments; absent or invalid segments become `None`.
    pub fn parse(tour: Option<&str>, location: Option<&str>) -> Self {
        Self {
            tour_id: tour.and_then(|s| TourId::new(s).ok()),
            location_id: location.and_then(|s| LocationId::new(s).ok()),
        }
    }
}

pub struct TourScope<B: TourBackend> {
    store: TourStore<B>,
    id: Option<TourId>,
}

impl<B: TourBackend> TourScope<B> {
    pub fn new(store: &TourStore<B>, params: RouteParams) -> Self {
        Self {
            store: store.clone(),
            id: params.tour_id,
        }
    }

    pub fn id(&self) -> Option<TourId> {
        self.id
    }

    pub fn get(&self) -> Arc<TourGraph> {
        self.store.tour(self.id)
    }

    pub fn update<R>(&self, mutator: impl FnOnce(&mut TourGraph) -> R) -> Option<R> {
        self.store.update_tour(self.id?, mutator)
    }

    pub fn add_location(&self, location: TourLocation) -> Option<LocationId> {
        self.update(|tour| tour.insert_location(location))
    }

    /// Remove a location. Actions elsewhere that lead to it are kept.
    pub fn remove_location(&self, location: LocationId) -> bool {
        let Some(id) = self.id else {
            return false;
        };
        self.store
            .update_tour_if(
                id,
                |tour| tour.locations.contains_key(&location),
                |tour| tour.remove_location(location),
            )
            .is_some()
    }

    pub fn location(&self, location: Option<LocationId>) -> LocationScope<B> {
        LocationScope {
            store: self.store.clone(),
            tour: self.id,
            location,
        }
    }

    /// Persist this tour immediately.
    pub async fn save(&self) -> bool {
        match self.id {
            Some(id) => self.store.save_now(id).await,
            None => false,
        }
    }
}

pub struct LocationScope<B: TourBackend> {
    store: TourStore<B>,
    tour: Option<TourId>,
    location: Option<LocationId>,
}

impl<B: TourBackend> LocationScope<B> {
    pub fn new(store: &TourStore<B>, params: RouteParams) -> Self {
        Self {
            store: store.clone(),
            tour: params.tour_id,
            location: params.location_id,
        }
    }

    pub fn tour_id(&self) -> Option<TourId> {
        self.tour
    }

    pub fn location_id(&self) -> Option<LocationId> {
        self.location
    }

    pub fn get(&self) -> Arc<TourLocation> {
        self.store.location(self.tour, self.location)
    }

    pub fn update<R>(&self, mutator: impl FnOnce(&mut TourLocation) -> R) -> Option<R> {
        self.store.update_location(self.tour?, self.location?, mutator)
    }

    pub fn add_overlay(&self, overlay: Overlay) -> Option<OverlayId> {
        self.update(|location| location.push_overlay(overlay))
    }

    /// Edit one overlay; siblings keep their identity.
    pub fn update_overlay<R>(
        &self,
        overlay: OverlayId,
        mutator: impl FnOnce(&mut Overlay) -> R,
    ) -> Option<R> {
        self.store
            .update_location_if(
                self.tour?,
                self.location?,
                |location| location.overlay(overlay).is_some(),
                |location| location.overlay_mut(overlay).map(mutator),
            )
            .flatten()
    }

    pub fn remove_overlay(&self, overlay: OverlayId) -> bool {
        let (Some(tour), Some(location)) = (self.tour, self.location) else {
            return false;
        };
        self.store
            .update_location_if(
                tour,
                location,
                |l| l.overlay(overlay).is_some(),
                |l| l.remove_overlay(overlay),
            )
            .flatten()
            .is_some()
    }

    pub fn add_action(&self, overlay: OverlayId, action: OverlayAction) -> bool {
        self.update_overlay(overlay, |o| o.actions.push(action))
            .is_some()
    }

    /// Remove the action at `index` of an overlay.
    pub fn remove_action(&self, overlay: OverlayId, index: usize) -> Option<OverlayAction> {
        let (tour, location) = (self.tour?, self.location?);
        self.store
            .update_location_if(
                tour,
                location,
                |l| l.overlay(overlay).is_some_and(|o| index < o.actions.len()),
                |l| l.overlay_mut(overlay).map(|o| o.actions.remove(index)),
            )
            .flatten()
    }
}
