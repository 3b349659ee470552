//! Modelo de ParkingZone
//!
//! Capacidad de una zona de parking. Además del contador de slots libres se
//! lleva el conjunto de números de slot emitidos, para que una etiqueta nunca
//! se repita entre los slots ocupados de la misma zona.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::errors::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingZone {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub total_slots: u32,
    pub available_slots: u32,
    pub is_active: bool,
    /// Menor valor = zona preferida
    pub priority: i32,
    pub occupied_slots: BTreeSet<u32>,
    /// Se incrementa en cada escritura; el store la usa como compare-and-swap
    pub version: i64,
}

impl ParkingZone {
    pub fn new(code: String, name: String, description: Option<String>, total_slots: u32, priority: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            name,
            description,
            total_slots,
            available_slots: total_slots,
            is_active: true,
            priority,
            occupied_slots: BTreeSet::new(),
            version: 0,
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.is_active && self.available_slots > 0
    }

    /// Emite el menor número de slot libre. Devuelve el snapshot nuevo y la etiqueta.
    pub fn reserve(&self) -> AppResult<(ParkingZone, String)> {
        if !self.is_eligible() {
            return Err(AppError::NoCapacity);
        }

        let number = (1..=self.total_slots)
            .find(|n| !self.occupied_slots.contains(n))
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Zone {} reports {} free slots but every label is occupied",
                    self.code, self.available_slots
                ))
            })?;

        let mut next = self.clone();
        next.occupied_slots.insert(number);
        next.available_slots -= 1;
        Ok((next, number.to_string()))
    }

    /// Libera un slot ocupado. Una etiqueta que no está ocupada es un doble release.
    pub fn release(&self, slot_label: &str) -> AppResult<ParkingZone> {
        let number = self.slot_number(slot_label)?;
        if self.available_slots >= self.total_slots || !self.occupied_slots.contains(&number) {
            return Err(AppError::OverRelease {
                zone: self.code.clone(),
            });
        }

        let mut next = self.clone();
        next.occupied_slots.remove(&number);
        next.available_slots += 1;
        Ok(next)
    }

    /// Vuelve a ocupar una etiqueta concreta tras un release compensado
    pub fn occupy(&self, slot_label: &str) -> AppResult<ParkingZone> {
        let number = self.slot_number(slot_label)?;
        if self.available_slots == 0 || self.occupied_slots.contains(&number) {
            return Err(AppError::Conflict(format!(
                "Slot {}-{} is already taken",
                self.code, slot_label
            )));
        }

        let mut next = self.clone();
        next.occupied_slots.insert(number);
        next.available_slots -= 1;
        Ok(next)
    }

    fn slot_number(&self, slot_label: &str) -> AppResult<u32> {
        slot_label
            .parse::<u32>()
            .ok()
            .filter(|n| (1..=self.total_slots).contains(n))
            .ok_or_else(|| AppError::OverRelease {
                zone: self.code.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_issues_lowest_free_label() {
        let zone = ParkingZone::new("A".into(), "Basement".into(), None, 3, 1);
        let (zone, first) = zone.reserve().unwrap();
        let (zone, second) = zone.reserve().unwrap();
        assert_eq!((first.as_str(), second.as_str()), ("1", "2"));
        assert_eq!(zone.available_slots, 1);

        let zone = zone.release("1").unwrap();
        let (zone, reused) = zone.reserve().unwrap();
        assert_eq!(reused, "1");
        assert_eq!(zone.occupied_slots.len(), 2);
    }

    #[test]
    fn test_full_zone_rejects_reserve() {
        let zone = ParkingZone::new("A".into(), "Basement".into(), None, 1, 1);
        let (zone, _) = zone.reserve().unwrap();
        assert!(matches!(zone.reserve(), Err(AppError::NoCapacity)));
        assert_eq!(zone.available_slots, 0);
    }

    #[test]
    fn test_over_release_is_rejected() {
        let zone = ParkingZone::new("B".into(), "Surface".into(), None, 2, 2);
        assert!(matches!(zone.release("1"), Err(AppError::OverRelease { .. })));
    }

    #[test]
    fn test_release_of_unheld_label_is_rejected_in_partly_full_zone() {
        let zone = ParkingZone::new("A".into(), "Basement".into(), None, 2, 1);
        let (zone, _) = zone.reserve().unwrap();
        let (zone, _) = zone.reserve().unwrap();

        let zone = zone.release("1").unwrap();
        assert!(matches!(zone.release("1"), Err(AppError::OverRelease { .. })));
        assert!(matches!(zone.release("7"), Err(AppError::OverRelease { .. })));
        assert!(matches!(zone.release("A-2"), Err(AppError::OverRelease { .. })));
        assert_eq!(zone.available_slots, 1);
        assert_eq!(zone.occupied_slots.iter().copied().collect::<Vec<_>>(), vec![2]);

        let (zone, label) = zone.reserve().unwrap();
        assert_eq!(label, "1");
        assert_eq!(zone.available_slots, 0);
    }

    #[test]
    fn test_occupy_restores_a_released_label() {
        let zone = ParkingZone::new("A".into(), "Basement".into(), None, 2, 1);
        let (zone, label) = zone.reserve().unwrap();
        let released = zone.release(&label).unwrap();

        let restored = released.occupy(&label).unwrap();
        assert_eq!(restored.occupied_slots, zone.occupied_slots);
        assert_eq!(restored.available_slots, zone.available_slots);
        assert!(matches!(restored.occupy(&label), Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_inactive_zone_not_eligible() {
        let mut zone = ParkingZone::new("C".into(), "Overflow".into(), None, 5, 3);
        zone.is_active = false;
        assert!(!zone.is_eligible());
        assert!(zone.reserve().is_err());
    }
}
