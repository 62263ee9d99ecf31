//! Quest Cart - backpack, slots and budget
//!
//! Every chosen item (backpack or slot) counts against the budget. Rejected
//! operations leave the cart exactly as it was.

use serde::Serialize;

use super::definition::{QuestItem, SlotConfig};
use super::engine::Rejection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cart {
    budget: u32,
    slot_configs: Vec<SlotConfig>,
    backpack: Vec<QuestItem>,
    slots: Vec<Option<QuestItem>>,
    selected: Option<usize>,
}

impl Cart {
    pub fn new(budget: u32, slot_configs: Vec<SlotConfig>) -> Self {
        let slots = vec![None; slot_configs.len()];
        Self {
            budget,
            slot_configs,
            backpack: Vec::new(),
            slots,
            selected: None,
        }
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    pub fn backpack(&self) -> &[QuestItem] {
        &self.backpack
    }

    pub fn slots(&self) -> &[Option<QuestItem>] {
        &self.slots
    }

    pub fn slot_configs(&self) -> &[SlotConfig] {
        &self.slot_configs
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Cost of everything chosen
    pub fn total(&self) -> u32 {
        self.chosen().map(|item| item.cost).sum()
    }

    /// Budget minus everything chosen
    pub fn coins_left(&self) -> i64 {
        self.budget as i64 - self.total() as i64
    }

    /// Items in the backpack and in slots
    pub fn chosen(&self) -> impl Iterator<Item = &QuestItem> {
        self.backpack.iter().chain(self.slots.iter().flatten())
    }

    pub fn chosen_count(&self) -> usize {
        self.chosen().count()
    }

    pub fn required_filled(&self) -> bool {
        self.slot_configs
            .iter()
            .zip(&self.slots)
            .all(|(config, slot)| !config.required || slot.is_some())
    }

    /// Append an item to the backpack if the budget allows it
    pub fn add(&mut self, item: QuestItem) -> Result<(), Rejection> {
        if self.coins_left() - (item.cost as i64) < 0 {
            return Err(Rejection::OverBudget);
        }
        self.backpack.push(item);
        Ok(())
    }

    /// Drop a backpack entry, refunding its cost
    pub fn remove_from_backpack(&mut self, index: usize) -> Option<QuestItem> {
        if index >= self.backpack.len() {
            return None;
        }
        self.selected = None;
        Some(self.backpack.remove(index))
    }

    /// Select a backpack entry; selecting the selected entry clears it
    pub fn toggle_select(&mut self, index: usize) {
        if index >= self.backpack.len() {
            return;
        }
        self.selected = if self.selected == Some(index) {
            None
        } else {
            Some(index)
        };
    }

    /// Move the selected backpack item into a slot of its category
    pub fn place_into_slot(&mut self, slot: usize) -> Result<(), Rejection> {
        let config = self.slot_configs.get(slot).ok_or(Rejection::EmptySlot)?;
        let index = self.selected.ok_or(Rejection::NothingSelected)?;
        let item = self.backpack.get(index).ok_or(Rejection::NothingSelected)?;

        if item.category != config.category {
            return Err(Rejection::SlotMismatch { slot });
        }
        // Slots hold one item
        if self.slots[slot].is_some() {
            return Err(Rejection::SlotTaken { slot });
        }

        let item = self.backpack.remove(index);
        self.slots[slot] = Some(item);
        self.selected = None;
        Ok(())
    }

    /// Move a slotted item back to the backpack; the budget is unchanged
    pub fn remove_from_slot(&mut self, slot: usize) -> Result<(), Rejection> {
        let item = self
            .slots
            .get_mut(slot)
            .and_then(Option::take)
            .ok_or(Rejection::EmptySlot)?;
        self.backpack.push(item);
        Ok(())
    }
}
