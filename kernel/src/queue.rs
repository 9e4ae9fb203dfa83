//! Generic queue engine
//!
//! Every list in the kernel (the MLQ ready levels, the sleep queue and all the
//! free pools) is a queue object from one [`QueueEngine`]. Entries are
//! `(key, data)` pairs stored in nodes borrowed from a single fixed node
//! arena; links are node indices, and free nodes form an intrusive stack
//! threaded through the same `next` field.
//!
//! A queue is either FIFO (tail append) or ordered by a comparator on the key.
//! Ordered insertion is stable: a new entry goes after every entry with an
//! equal key.
//!
//! Queue object 0 is the free list of queue objects. It is created by
//! [`QueueEngine::init_module`] and holds the ids of all unallocated queues,
//! so queue objects are pooled exactly like PCBs and stacks.

use core::cmp::Ordering;

pub type Key = u64;
pub type Data = usize;

/// Handle of a queue object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(u8);

impl QueueId {
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn from_raw(id: u8) -> Self {
        QueueId(id)
    }
}

/// Slot in the shared node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIndex(u16);

impl NodeIndex {
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Insertion discipline of a queue.
#[derive(Clone, Copy)]
pub enum QueueOrder {
    Fifo,
    Ordered(fn(Key, Key) -> Ordering),
}

impl core::fmt::Debug for QueueOrder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            QueueOrder::Fifo => f.write_str("Fifo"),
            QueueOrder::Ordered(_) => f.write_str("Ordered"),
        }
    }
}

/// Ascending order on tick values; used by the sleep queue.
pub fn compare_time(a: Key, b: Key) -> Ordering {
    a.cmp(&b)
}

const QUEUE_FREE_LIST: QueueId = QueueId(0);

/// Entries shown by [`QueueEngine::dump`].
const DUMP_LIMIT: usize = 10;

#[derive(Clone, Copy)]
struct QNode {
    key: Key,
    data: Data,
    next: Option<NodeIndex>,
}

impl QNode {
    const EMPTY: QNode = QNode {
        key: 0,
        data: 0,
        next: None,
    };
}

#[derive(Clone, Copy)]
struct QueueObj {
    head: Option<NodeIndex>,
    tail: Option<NodeIndex>,
    len: usize,
    order: QueueOrder,
    allocated: bool,
}

impl QueueObj {
    const EMPTY: QueueObj = QueueObj {
        head: None,
        tail: None,
        len: 0,
        order: QueueOrder::Fifo,
        allocated: false,
    };
}

/// Fixed-capacity pool of queue objects sharing one node arena.
pub struct QueueEngine<const NODES: usize, const QUEUES: usize> {
    nodes: [QNode; NODES],
    free_node: Option<NodeIndex>,
    live: usize,
    queues: [QueueObj; QUEUES],
}

impl<const NODES: usize, const QUEUES: usize> QueueEngine<NODES, QUEUES> {
    const _SIZES_FIT: () = {
        assert!(QUEUES >= 1 && QUEUES <= u8::MAX as usize + 1);
        assert!(NODES <= u16::MAX as usize + 1);
    };

    pub const fn new() -> Self {
        let () = Self::_SIZES_FIT;
        Self {
            nodes: [QNode::EMPTY; NODES],
            free_node: None,
            live: 0,
            queues: [QueueObj::EMPTY; QUEUES],
        }
    }

    /// Module initialization: thread every node onto the free stack and
    /// build the free list of queue objects (queue 0).
    pub fn init_module(&mut self) {
        for i in 0..NODES {
            let next = if i + 1 < NODES {
                Some(NodeIndex((i + 1) as u16))
            } else {
                None
            };
            self.nodes[i] = QNode { next, ..QNode::EMPTY };
        }
        self.free_node = if NODES > 0 { Some(NodeIndex(0)) } else { None };
        self.live = 0;
        self.queues = [QueueObj::EMPTY; QUEUES];

        self.queues[QUEUE_FREE_LIST.as_usize()].allocated = true;
        for id in 1..QUEUES {
            self.insert(QUEUE_FREE_LIST, id, 0);
        }

        log::info!(
            "queue: {} queue objects, {} nodes ({} free)",
            QUEUES,
            NODES,
            self.free_node_count()
        );
    }

    /// Reserve up to `out.len()` queue objects, writing their ids into `out`.
    ///
    /// Returns how many were obtained. Each reserved queue starts empty and
    /// FIFO; callers that need ordering follow up with [`Self::init`].
    pub fn alloc(&mut self, out: &mut [QueueId]) -> usize {
        let mut got = 0;
        for slot in out.iter_mut() {
            let Some(raw) = self.remove(QUEUE_FREE_LIST) else {
                break;
            };
            let id = QueueId(raw as u8);
            self.queues[id.as_usize()] = QueueObj {
                allocated: true,
                ..QueueObj::EMPTY
            };
            *slot = id;
            got += 1;
        }
        if got < out.len() {
            log::warn!("queue: alloc wanted {} objects, got {}", out.len(), got);
        }
        got
    }

    /// Reserve a single queue object with the given order.
    pub fn alloc_one(&mut self, order: QueueOrder) -> Option<QueueId> {
        let mut id = [QUEUE_FREE_LIST];
        if self.alloc(&mut id) == 1 {
            self.init(id[0], order);
            Some(id[0])
        } else {
            None
        }
    }

    /// Return a queue object to the free list, releasing any entries it
    /// still holds.
    pub fn dealloc(&mut self, queue: QueueId) {
        if queue == QUEUE_FREE_LIST || !self.obj(queue).allocated {
            log::warn!("queue: dealloc of unallocated queue {}", queue.0);
            return;
        }
        self.drain(queue);
        self.queues[queue.as_usize()] = QueueObj::EMPTY;
        self.insert(QUEUE_FREE_LIST, queue.as_usize(), 0);
    }

    /// Reset `queue` to empty with the given ordering rule.
    pub fn init(&mut self, queue: QueueId, order: QueueOrder) {
        self.drain(queue);
        let obj = self.obj_mut(queue);
        obj.order = order;
    }

    /// Insert `(key, data)` according to the queue's order.
    ///
    /// Panics if the node arena is exhausted; the pools are sized so that
    /// this only happens on a bookkeeping bug.
    pub fn insert(&mut self, queue: QueueId, data: Data, key: Key) {
        let node = match self.alloc_node() {
            Some(node) => node,
            None => panic!(
                "queue: node pool exhausted inserting into queue {} ({} live)",
                queue.0, self.live
            ),
        };
        self.nodes[node.as_usize()] = QNode {
            key,
            data,
            next: None,
        };

        let obj = self.queues[queue.as_usize()];
        debug_assert!(obj.allocated, "insert into unallocated queue");

        let prev = match obj.order {
            QueueOrder::Fifo => obj.tail,
            QueueOrder::Ordered(compare) => {
                let mut prev = None;
                let mut cur = obj.head;
                while let Some(c) = cur {
                    let n = &self.nodes[c.as_usize()];
                    if compare(key, n.key) == Ordering::Less {
                        break;
                    }
                    prev = Some(c);
                    cur = n.next;
                }
                prev
            }
        };

        match prev {
            None => {
                self.nodes[node.as_usize()].next = obj.head;
                self.queues[queue.as_usize()].head = Some(node);
            }
            Some(p) => {
                self.nodes[node.as_usize()].next = self.nodes[p.as_usize()].next;
                self.nodes[p.as_usize()].next = Some(node);
            }
        }
        let obj = self.obj_mut(queue);
        if obj.tail == prev {
            obj.tail = Some(node);
        }
        obj.len += 1;
    }

    /// Pop the head entry's data; `None` only when the queue is empty.
    pub fn remove(&mut self, queue: QueueId) -> Option<Data> {
        let head = self.obj(queue).head?;
        let QNode { data, next, .. } = self.nodes[head.as_usize()];
        let obj = self.obj_mut(queue);
        obj.head = next;
        if next.is_none() {
            obj.tail = None;
        }
        obj.len -= 1;
        self.free_node_at(head);
        Some(data)
    }

    /// Unlink the first entry carrying `data`, returning its key.
    pub fn remove_entry(&mut self, queue: QueueId, data: Data) -> Option<Key> {
        let mut prev: Option<NodeIndex> = None;
        let mut cur = self.obj(queue).head;
        while let Some(c) = cur {
            let node = self.nodes[c.as_usize()];
            if node.data == data {
                match prev {
                    None => self.obj_mut(queue).head = node.next,
                    Some(p) => self.nodes[p.as_usize()].next = node.next,
                }
                let obj = self.obj_mut(queue);
                if obj.tail == Some(c) {
                    obj.tail = prev;
                }
                obj.len -= 1;
                self.free_node_at(c);
                return Some(node.key);
            }
            prev = Some(c);
            cur = node.next;
        }
        None
    }

    pub fn peek_key(&self, queue: QueueId) -> Option<Key> {
        self.obj(queue).head.map(|h| self.nodes[h.as_usize()].key)
    }

    pub fn peek_data(&self, queue: QueueId) -> Option<Data> {
        self.obj(queue).head.map(|h| self.nodes[h.as_usize()].data)
    }

    pub fn is_empty(&self, queue: QueueId) -> bool {
        self.obj(queue).len == 0
    }

    pub fn len(&self, queue: QueueId) -> usize {
        self.obj(queue).len
    }

    pub fn contains(&self, queue: QueueId, data: Data) -> bool {
        self.iter(queue).any(|(_, d)| d == data)
    }

    /// Walk `(key, data)` pairs from head to tail.
    pub fn iter(&self, queue: QueueId) -> QueueIter<'_, NODES> {
        QueueIter {
            nodes: &self.nodes,
            cur: self.obj(queue).head,
        }
    }

    /// Nodes currently linked into some queue.
    pub fn live_nodes(&self) -> usize {
        self.live
    }

    pub fn free_node_count(&self) -> usize {
        NODES - self.live
    }

    /// Unallocated queue objects.
    pub fn free_queue_count(&self) -> usize {
        self.len(QUEUE_FREE_LIST)
    }

    /// Log the header and the first few entries of `queue`.
    pub fn dump(&self, name: &str, queue: QueueId) {
        let obj = self.obj(queue);
        log::info!(
            "{} (queue {}): {} entries, {:?}",
            name,
            queue.0,
            obj.len,
            obj.order
        );
        for (i, (key, data)) in self.iter(queue).take(DUMP_LIMIT).enumerate() {
            log::info!("  [{}] key {} data {}", i, key, data);
        }
        if obj.len > DUMP_LIMIT {
            log::info!("  ... {} more", obj.len - DUMP_LIMIT);
        }
    }

    fn drain(&mut self, queue: QueueId) {
        while self.remove(queue).is_some() {}
    }

    fn alloc_node(&mut self) -> Option<NodeIndex> {
        let node = self.free_node?;
        self.free_node = self.nodes[node.as_usize()].next;
        self.live += 1;
        Some(node)
    }

    fn free_node_at(&mut self, node: NodeIndex) {
        self.nodes[node.as_usize()] = QNode {
            next: self.free_node,
            ..QNode::EMPTY
        };
        self.free_node = Some(node);
        self.live -= 1;
    }

    fn obj(&self, queue: QueueId) -> &QueueObj {
        &self.queues[queue.as_usize()]
    }

    fn obj_mut(&mut self, queue: QueueId) -> &mut QueueObj {
        &mut self.queues[queue.as_usize()]
    }
}

impl<const NODES: usize, const QUEUES: usize> Default for QueueEngine<NODES, QUEUES> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct QueueIter<'a, const NODES: usize> {
    nodes: &'a [QNode; NODES],
    cur: Option<NodeIndex>,
}

impl<const NODES: usize> Iterator for QueueIter<'_, NODES> {
    type Item = (Key, Data);

    fn next(&mut self) -> Option<Self::Item> {
        let c = self.cur?;
        let node = &self.nodes[c.as_usize()];
        self.cur = node.next;
        Some((node.key, node.data))
    }
}
