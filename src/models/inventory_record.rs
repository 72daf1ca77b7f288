use brick_api::{InventoryPayload, MinifigEntry, PartLine};
use serde::{Deserialize, Serialize};

/// Parts list of one set; replaced wholesale on refetch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryRecord {
    pub set_num: String,
    pub parts: Vec<PartLine>,
    pub minifigs: Option<Vec<MinifigEntry>>,
    pub fetched_at: i64,
}

impl InventoryRecord {
    pub fn from_payload(payload: InventoryPayload, fetched_at: i64) -> Self {
        Self {
            set_num: payload.set_num,
            parts: payload.parts,
            minifigs: payload.minifigs,
            fetched_at,
        }
    }

    /// Total quantity needed for one part/color/spare combination.
    ///
    /// The same part can appear on several lines (e.g. once for the set and
    /// once inside a minifig), so matching lines are summed. Returns `None` if
    /// the inventory has no such line.
    pub fn needed_quantity(&self, part_num: &str, color_id: i64, is_spare: bool) -> Option<u32> {
        let mut found = false;
        let mut total: u32 = 0;
        for line in &self.parts {
            if line.part_num == part_num && line.color_id == color_id && line.is_spare == is_spare
            {
                found = true;
                total = total.saturating_add(line.quantity);
            }
        }
        found.then_some(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(part_num: &str, color_id: i64, quantity: u32, is_spare: bool) -> PartLine {
        PartLine {
            part_num: part_num.to_string(),
            color_id,
            part_name: "Brick 2 x 2".to_string(),
            color_name: "Blue".to_string(),
            quantity,
            is_spare,
            is_minifig: false,
            image_url: None,
        }
    }

    #[test]
    fn test_needed_quantity_sums_duplicate_lines() {
        let inventory = InventoryRecord {
            set_num: "10696-1".to_string(),
            parts: vec![
                line("3003", 1, 4, false),
                line("3003", 1, 2, false),
                line("3003", 1, 1, true),
            ],
            minifigs: None,
            fetched_at: 0,
        };

        assert_eq!(inventory.needed_quantity("3003", 1, false), Some(6));
        assert_eq!(inventory.needed_quantity("3003", 1, true), Some(1));
        assert_eq!(inventory.needed_quantity("3003", 5, false), None);
    }
}
