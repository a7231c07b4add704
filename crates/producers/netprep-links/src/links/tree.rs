use kiddo::{KdTree, SquaredEuclidean};

use netprep_core::times::TimeMS;

use crate::links::config::{DeviceCount, Radius};
use crate::links::reader::AgentIdPos;

/// One row of a link table. Distances are planar Euclidean.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct LinkRow {
    pub(crate) time_step: u64,
    pub(crate) agent_id: u64,
    pub(crate) target_id: u64,
    pub(crate) distance: f64,
}

/// Builds a query tree over a snapshot of positions. The tree is never
/// mutated, a changed position set needs a new tree.
pub(crate) fn build_position_tree(id_positions: &AgentIdPos) -> KdTree<f64, 2> {
    let mut tree = KdTree::default();
    id_positions.iter().for_each(|id_pos| {
        tree.add(&id_pos.1, id_pos.0.as_u64());
    });
    tree
}

/// Infrastructure positions with their query tree, built once per run.
pub(crate) struct DeviceTree {
    pub(crate) id_positions: AgentIdPos,
    tree: KdTree<f64, 2>,
}

impl DeviceTree {
    pub(crate) fn new(id_positions: AgentIdPos) -> Self {
        let tree = build_position_tree(&id_positions);
        Self { id_positions, tree }
    }

    /// Links from each given mobile node to its closest infrastructure
    /// devices. Ids never overlap across device classes, so nothing is
    /// filtered.
    pub(crate) fn n2i_links_with_count(
        &self,
        sources: &AgentIdPos,
        now: TimeMS,
        count: DeviceCount,
    ) -> Vec<LinkRow> {
        let mut links = Vec::new();
        for (agent_id, position) in sources.iter() {
            let neighbours = self
                .tree
                .nearest_n::<SquaredEuclidean>(position, count.as_usize());
            for neighbour in neighbours {
                links.push(LinkRow {
                    time_step: now.as_u64(),
                    agent_id: agent_id.as_u64(),
                    target_id: neighbour.item,
                    distance: neighbour.distance.sqrt(),
                });
            }
        }
        links
    }

    /// Links from each infrastructure device to all mobile nodes within the
    /// given radius.
    pub(crate) fn i2n_links_with_radius(
        &self,
        node_tree: &KdTree<f64, 2>,
        now: TimeMS,
        radius: Radius,
    ) -> Vec<LinkRow> {
        let mut links = Vec::new();
        for (infra_id, position) in self.id_positions.iter() {
            let neighbours = node_tree
                .within::<SquaredEuclidean>(position, radius.as_f64() * radius.as_f64());
            for neighbour in neighbours {
                links.push(LinkRow {
                    time_step: now.as_u64(),
                    agent_id: infra_id.as_u64(),
                    target_id: neighbour.item,
                    distance: neighbour.distance.sqrt(),
                });
            }
        }
        links
    }

    /// Links among the devices of this tree. The query includes the device
    /// itself, so one extra neighbour is requested and the device is dropped
    /// from its own results by id.
    pub(crate) fn i2i_links_with_count(&self, count: DeviceCount) -> Vec<LinkRow> {
        let mut links = Vec::new();
        for (infra_id, position) in self.id_positions.iter() {
            let neighbours = self
                .tree
                .nearest_n::<SquaredEuclidean>(position, count.as_usize() + 1);
            links.extend(
                neighbours
                    .into_iter()
                    .filter(|neighbour| neighbour.item != infra_id.as_u64())
                    .take(count.as_usize())
                    .map(|neighbour| LinkRow {
                        time_step: 0,
                        agent_id: infra_id.as_u64(),
                        target_id: neighbour.item,
                        distance: neighbour.distance.sqrt(),
                    }),
            );
        }
        links
    }

    /// Links from this tree's devices to another class of infrastructure
    /// within the given radius. Different classes never share ids, so
    /// coincident devices are kept.
    pub(crate) fn i2other_links_with_radius(
        &self,
        other: &DeviceTree,
        now: TimeMS,
        radius: Radius,
    ) -> Vec<LinkRow> {
        let mut links = Vec::new();
        for (infra_id, position) in self.id_positions.iter() {
            let neighbours = other
                .tree
                .within::<SquaredEuclidean>(position, radius.as_f64() * radius.as_f64());
            for neighbour in neighbours {
                links.push(LinkRow {
                    time_step: now.as_u64(),
                    agent_id: infra_id.as_u64(),
                    target_id: neighbour.item,
                    distance: neighbour.distance.sqrt(),
                });
            }
        }
        links
    }
}

/// Links among mobile nodes within the given radius, self-matches dropped
/// by id so coincident vehicles stay linked to each other.
pub(crate) fn n2n_links_with_radius(
    sources: &AgentIdPos,
    node_tree: &KdTree<f64, 2>,
    now: TimeMS,
    radius: Radius,
) -> Vec<LinkRow> {
    let mut links = Vec::new();
    for (agent_id, position) in sources.iter() {
        let neighbours =
            node_tree.within::<SquaredEuclidean>(position, radius.as_f64() * radius.as_f64());
        links.extend(
            neighbours
                .into_iter()
                .filter(|neighbour| neighbour.item != agent_id.as_u64())
                .map(|neighbour| LinkRow {
                    time_step: now.as_u64(),
                    agent_id: agent_id.as_u64(),
                    target_id: neighbour.item,
                    distance: neighbour.distance.sqrt(),
                }),
        );
    }
    links
}

#[cfg(test)]
mod tests {
    use netprep_core::agent::AgentId;

    use super::*;

    fn id_pos(entries: &[(u64, f64, f64)]) -> AgentIdPos {
        entries
            .iter()
            .map(|entry| (AgentId::from(entry.0), [entry.1, entry.2]))
            .collect()
    }

    fn sorted(mut links: Vec<LinkRow>) -> Vec<LinkRow> {
        links.sort_by_key(|link| (link.agent_id, link.target_id));
        links
    }

    #[test]
    fn nearest_infra_link_for_vehicle() {
        let rsu_tree = DeviceTree::new(id_pos(&[(1001, 0.0, 0.0), (1002, 10.0, 0.0)]));
        let vehicles = id_pos(&[(1, 1.0, 0.0)]);

        let links =
            rsu_tree.n2i_links_with_count(&vehicles, TimeMS::from(0u64), DeviceCount::from(1));
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].agent_id, 1);
        assert_eq!(links[0].target_id, 1001);
        assert!((links[0].distance - 1.0).abs() < 1e-9);
    }

    #[test]
    fn coincident_cross_class_device_is_kept() {
        let rsu_tree = DeviceTree::new(id_pos(&[(1001, 0.0, 0.0), (1002, 10.0, 0.0)]));
        // A vehicle parked exactly on the first RSU.
        let vehicles = id_pos(&[(1, 0.0, 0.0)]);

        let links =
            rsu_tree.n2i_links_with_count(&vehicles, TimeMS::from(0u64), DeviceCount::from(1));
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target_id, 1001);
        assert!(links[0].distance.abs() < 1e-9);
    }

    #[test]
    fn same_class_count_query_drops_self() {
        let rsu_tree = DeviceTree::new(id_pos(&[(1001, 0.0, 0.0), (1002, 10.0, 0.0)]));

        let links = sorted(rsu_tree.i2i_links_with_count(DeviceCount::from(1)));
        assert_eq!(links.len(), 2);
        for link in links.iter() {
            assert_ne!(link.agent_id, link.target_id);
            assert!((link.distance - 10.0).abs() < 1e-9);
        }
        assert_eq!(links[0].agent_id, 1001);
        assert_eq!(links[0].target_id, 1002);
    }

    #[test]
    fn radius_query_respects_the_radius() {
        let rsu_tree = DeviceTree::new(id_pos(&[(1001, 0.0, 0.0), (1002, 10.0, 0.0)]));
        let vehicles = id_pos(&[(1, 1.0, 0.0)]);
        let veh_tree = build_position_tree(&vehicles);

        let links =
            rsu_tree.i2n_links_with_radius(&veh_tree, TimeMS::from(0u64), Radius::from(5.0));
        // Only the RSU at the origin is in range, 9.0 > 5.0 for the other.
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].agent_id, 1001);
        assert_eq!(links[0].target_id, 1);
        assert!((links[0].distance - 1.0).abs() < 1e-9);
    }

    #[test]
    fn vehicle_links_drop_self_but_keep_coincident_others() {
        let vehicles = id_pos(&[(1, 0.0, 0.0), (2, 0.0, 0.0), (3, 3.0, 4.0)]);
        let veh_tree = build_position_tree(&vehicles);

        let links = sorted(n2n_links_with_radius(
            &vehicles,
            &veh_tree,
            TimeMS::from(0u64),
            Radius::from(5.0),
        ));
        assert_eq!(links.len(), 6);
        for link in links.iter() {
            assert_ne!(link.agent_id, link.target_id);
        }
        // Two vehicles at the same spot stay linked at distance zero.
        assert!(links[0].distance.abs() < 1e-9);
        // 3-4-5 triangle, exact within floating point tolerance.
        let diagonal = links
            .iter()
            .find(|link| link.agent_id == 1 && link.target_id == 3)
            .expect("missing link");
        assert!((diagonal.distance - 5.0).abs() < 1e-9);
    }

    #[test]
    fn cross_class_radius_keeps_coincident_devices() {
        let rsu_tree = DeviceTree::new(id_pos(&[(1001, 0.0, 0.0)]));
        let controller_tree = DeviceTree::new(id_pos(&[(2001, 0.0, 0.0)]));

        let links = rsu_tree.i2other_links_with_radius(
            &controller_tree,
            TimeMS::from(0u64),
            Radius::from(100.0),
        );
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].agent_id, 1001);
        assert_eq!(links[0].target_id, 2001);
        assert!(links[0].distance.abs() < 1e-9);
    }
}
