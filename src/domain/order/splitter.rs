use super::value_objects::{OrderLineItem, VendorSubOrder};

/// Group line items by vendor, vendors in order of first appearance.
///
/// Items keep their relative order inside each group, so the same input
/// always yields the same sub-orders. Every returned sub-order is `pending`.
pub fn split_by_vendor(items: &[OrderLineItem]) -> Vec<VendorSubOrder> {
    let mut groups: Vec<VendorSubOrder> = Vec::new();

    for item in items {
        match groups.iter_mut().find(|group| group.vendor_id == item.vendor_id) {
            Some(group) => group.items.push(item.clone()),
            None => {
                let mut group = VendorSubOrder::pending(item.vendor_id);
                group.items.push(item.clone());
                groups.push(group);
            }
        }
    }

    groups
}

/// Whether `sub_orders` contain exactly the given items, each once
pub fn is_partition_of(sub_orders: &[VendorSubOrder], items: &[OrderLineItem]) -> bool {
    let grouped: usize = sub_orders.iter().map(|group| group.items.len()).sum();
    if grouped != items.len() {
        return false;
    }

    let mut remaining: Vec<&OrderLineItem> = items.iter().collect();
    for group in sub_orders {
        for item in &group.items {
            if item.vendor_id != group.vendor_id {
                return false;
            }
            match remaining.iter().position(|candidate| *candidate == item) {
                Some(index) => {
                    remaining.swap_remove(index);
                }
                None => return false,
            }
        }
    }

    remaining.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::value_objects::VendorOrderStatus;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn item(vendor_id: Uuid, name: &str) -> OrderLineItem {
        OrderLineItem {
            product_id: Uuid::new_v4(),
            vendor_id,
            name: name.to_string(),
            quantity: 1,
            price: dec!(5),
            discount: dec!(0),
            total_price: dec!(5),
            image: String::new(),
        }
    }

    fn names(group: &VendorSubOrder) -> Vec<&str> {
        group.items.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn test_groups_by_first_seen_vendor() {
        let vendor_b = Uuid::new_v4();
        let vendor_a = Uuid::new_v4();
        let items = vec![
            item(vendor_b, "b1"),
            item(vendor_a, "a1"),
            item(vendor_b, "b2"),
            item(vendor_a, "a2"),
        ];

        let groups = split_by_vendor(&items);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].vendor_id, vendor_b);
        assert_eq!(names(&groups[0]), vec!["b1", "b2"]);
        assert_eq!(groups[1].vendor_id, vendor_a);
        assert_eq!(names(&groups[1]), vec!["a1", "a2"]);
        assert!(groups.iter().all(|g| g.status == VendorOrderStatus::Pending));
        assert!(is_partition_of(&groups, &items));
    }

    #[test]
    fn test_split_is_deterministic() {
        let vendors: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let items: Vec<OrderLineItem> = (0..12)
            .map(|i| item(vendors[(i * 7) % 4], &format!("item-{}", i)))
            .collect();

        assert_eq!(split_by_vendor(&items), split_by_vendor(&items));
    }

    #[test]
    fn test_partition_check_detects_omission() {
        let vendor = Uuid::new_v4();
        let items = vec![item(vendor, "x"), item(vendor, "y")];
        let mut groups = split_by_vendor(&items);
        groups[0].items.pop();

        assert!(!is_partition_of(&groups, &items));
        assert!(split_by_vendor(&[]).is_empty());
    }
}
