//! Partitions feed items into variant groups and picks each group's master
//! representative, the item that seeds the product's base attributes.

use std::collections::BTreeMap;

use crate::feed::FeedItem;

const GROUP_KEY_PREFIX: &str = "group:";
const ITEM_KEY_PREFIX: &str = "item:";

/// One logical product: every feed item sharing a group id, or a singleton
/// for a standalone item. Built once per run, read-only afterwards.
#[derive(Debug, Clone)]
pub struct VariantGroup {
    pub key: String,
    pub items: Vec<FeedItem>,
    master: usize,
}

impl VariantGroup {
    fn new(key: String, items: Vec<FeedItem>) -> Self {
        let master = select_master(&items);
        Self { key, items, master }
    }

    /// The representative item used for the product's base attributes.
    pub fn master(&self) -> &FeedItem {
        &self.items[self.master]
    }

    /// All items except the master, in feed order.
    pub fn non_master(&self) -> impl Iterator<Item = &FeedItem> {
        self.items
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != self.master)
            .map(|(_, item)| item)
    }

    pub fn is_multi_variant(&self) -> bool {
        self.items.len() > 1
    }

    /// Distinct colors across the group's variants.
    pub fn distinct_colors(&self) -> Vec<&str> {
        let mut colors: Vec<&str> = self
            .items
            .iter()
            .filter_map(|item| item.color.as_deref())
            .collect();
        colors.sort_unstable();
        colors.dedup();
        colors
    }

    /// The raw group id when this group came from the feed's grouping field.
    pub fn feed_group_id(&self) -> Option<&str> {
        self.key.strip_prefix(GROUP_KEY_PREFIX)
    }
}

/// Index of the master item: in-stock items first, then lowest price, then
/// lexical title order. Deterministic and insensitive to input order.
fn select_master(items: &[FeedItem]) -> usize {
    items
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            b.in_stock()
                .cmp(&a.in_stock())
                .then(a.price.cmp(&b.price))
                .then(a.title.cmp(&b.title))
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Partition items into variant groups.
///
/// Items carrying a group id share a `group:`-keyed group; standalone items
/// become singleton groups under `item:{external_id}`. The two prefixes keep
/// the key spaces disjoint, so a feed group id can never collide with a
/// synthetic singleton key. Output order is deterministic (sorted by key).
pub fn group_items(items: Vec<FeedItem>) -> Vec<VariantGroup> {
    let mut buckets: BTreeMap<String, Vec<FeedItem>> = BTreeMap::new();
    for item in items {
        let key = match &item.group_id {
            Some(group_id) => format!("{GROUP_KEY_PREFIX}{group_id}"),
            None => format!("{ITEM_KEY_PREFIX}{}", item.external_id),
        };
        buckets.entry(key).or_default().push(item);
    }
    buckets
        .into_iter()
        .map(|(key, items)| VariantGroup::new(key, items))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{Availability, Condition};
    use rust_decimal::Decimal;
    use std::collections::BTreeSet;

    fn item(id: &str, group: Option<&str>, price: &str, avail: Availability, title: &str) -> FeedItem {
        FeedItem {
            external_id: id.to_string(),
            group_id: group.map(str::to_string),
            title: title.to_string(),
            description: String::new(),
            vendor: "Acme".to_string(),
            condition: Condition::New,
            price: price.parse::<Decimal>().unwrap(),
            sku: Some(id.to_string()),
            gtin: None,
            images: Vec::new(),
            availability: avail,
            color: None,
            category: "General".to_string(),
            tags: BTreeSet::new(),
        }
    }

    #[test]
    fn grouping_is_a_partition() {
        let items = vec![
            item("a", Some("G1"), "10", Availability::InStock, "A"),
            item("b", Some("G1"), "12", Availability::InStock, "B"),
            item("c", None, "5", Availability::InStock, "C"),
            item("d", Some("G2"), "7", Availability::InStock, "D"),
        ];
        let groups = group_items(items);
        assert_eq!(groups.len(), 3); // G1, G2, and one singleton
        let total: usize = groups.iter().map(|g| g.items.len()).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn singleton_keys_cannot_collide_with_group_keys() {
        // A standalone item whose id equals a real group id must still land
        // in its own group.
        let items = vec![
            item("G1", None, "5", Availability::InStock, "Loner"),
            item("a", Some("G1"), "10", Availability::InStock, "A"),
        ];
        let groups = group_items(items);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn master_prefers_in_stock_then_lowest_price() {
        let items = vec![
            item("a", Some("G"), "4", Availability::OutOfStock, "Cheapest but gone"),
            item("b", Some("G"), "12", Availability::InStock, "Pricey"),
            item("c", Some("G"), "10", Availability::InStock, "Winner"),
        ];
        let groups = group_items(items);
        assert_eq!(groups[0].master().external_id, "c");
    }

    #[test]
    fn master_selection_is_order_insensitive() {
        let a = item("a", Some("G"), "10", Availability::InStock, "Red");
        let b = item("b", Some("G"), "10", Availability::InStock, "Blue");
        let c = item("c", Some("G"), "12", Availability::InStock, "Green");

        let forward = group_items(vec![a.clone(), b.clone(), c.clone()]);
        let reversed = group_items(vec![c, b, a]);
        assert_eq!(
            forward[0].master().external_id,
            reversed[0].master().external_id
        );
        // Equal availability and price: lexical title order breaks the tie.
        assert_eq!(forward[0].master().title, "Blue");
    }

    #[test]
    fn feed_group_id_round_trips() {
        let groups = group_items(vec![item("a", Some("G9"), "1", Availability::InStock, "A")]);
        assert_eq!(groups[0].feed_group_id(), Some("G9"));

        let singles = group_items(vec![item("a", None, "1", Availability::InStock, "A")]);
        assert_eq!(singles[0].feed_group_id(), None);
    }
}
