use mirage_netlink::{
    wire::{constants::*, Attribute, Attributes, NetlinkHeader},
    Request, Session, SessionOptions, MAX_ATTR_NEST,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::kernel::{ScriptedKernel, PORT_ID};

#[derive(Debug)]
enum Node {
    Leaf(u16, Vec<u8>),
    Nest(u16, Vec<Node>),
}

/// Generates a tree whose deepest attribute sits exactly at or below the nesting limit.
fn generate(rng: &mut StdRng, depth: usize) -> Node {
    let kind = rng.gen_range(1..512);
    if depth + 1 >= MAX_ATTR_NEST || rng.gen_bool(0.5) {
        let len = rng.gen_range(0..40);
        return Node::Leaf(kind, (0..len).map(|_| rng.gen()).collect());
    }

    let children = rng.gen_range(1..4);
    Node::Nest(kind, (0..children).map(|_| generate(rng, depth + 1)).collect())
}

/// Writes `node` alternating between explicit push/pop and scoped guards.
fn write(request: &mut Request<'_, ScriptedKernel>, node: &Node, guarded: bool) {
    match node {
        Node::Leaf(kind, value) => {
            request.attribute(*kind, value).unwrap();
        }
        Node::Nest(kind, children) if guarded => {
            let mut nested = request.nest(*kind).unwrap();
            for child in children {
                write(&mut nested, child, !guarded);
            }
        }
        Node::Nest(kind, children) => {
            request.push_attribute(*kind).unwrap();
            for child in children {
                write(request, child, !guarded);
            }
            request.pop_attribute().unwrap();
        }
    }
}

/// Checks `attr`, found at absolute offset `at` in the message, against `node`.
fn verify(attr: &Attribute<'_>, at: usize, node: &Node) {
    assert_eq!(at % 4, 0, "attribute at unaligned offset {at}");

    match node {
        Node::Leaf(kind, value) => {
            assert_eq!(attr.kind, *kind);
            assert_eq!(attr.length(), NLA_HDRLEN + value.len());
            assert_eq!(attr.value, &value[..]);
        }
        Node::Nest(kind, children) => {
            assert_eq!(attr.kind, *kind);

            let nested: Vec<_> = attr.nested().collect();
            assert_eq!(nested.len(), children.len());
            for (child_attr, child) in nested.iter().zip(children) {
                verify(child_attr, at + NLA_HDRLEN + child_attr.offset, child);
            }
        }
    }
}

fn build(send_buffer_size: usize, tree: &[Node]) -> Vec<u8> {
    let options = SessionOptions::default().with_send_buffer_size(send_buffer_size);
    let mut session = Session::with_transport(ScriptedKernel::default(), PORT_ID, options);

    let mut request = session.begin_message(RTM_NEWLINK, 0);
    for (i, node) in tree.iter().enumerate() {
        write(&mut request, node, i % 2 == 0);
    }
    assert_eq!(request.depth(), 0);
    request.send().unwrap();

    session.transport().sent[0].clone()
}

#[test]
fn random_trees_round_trip() {
    let _ = tracing_subscriber::fmt::try_init();

    for seed in 0..64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let tree: Vec<Node> = (0..rng.gen_range(1..5)).map(|_| generate(&mut rng, 0)).collect();

        let message = build(4096, &tree);
        let header = NetlinkHeader::parse(&message).unwrap();
        assert_eq!(header.length as usize, message.len());
        assert_eq!(message.len() % 4, 0);

        let top: Vec<_> = Attributes::new(&message[NLMSG_HDRLEN..]).collect();
        assert_eq!(top.len(), tree.len(), "seed {seed}");
        for (attr, node) in top.iter().zip(&tree) {
            verify(attr, NLMSG_HDRLEN + attr.offset, node);
        }
    }
}

#[test]
fn arena_growth_does_not_change_output() {
    let _ = tracing_subscriber::fmt::try_init();

    for seed in 0..16 {
        let mut rng = StdRng::seed_from_u64(seed);
        let tree: Vec<Node> = (0..8).map(|_| generate(&mut rng, 0)).collect();

        // The smallest arena has to grow repeatedly while the largest never does.
        assert_eq!(build(NLMSG_HDRLEN, &tree), build(64 * 1024, &tree), "seed {seed}");
    }
}

#[test]
fn deepest_allowed_nesting() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut tree = Node::Leaf(1, b"core".to_vec());
    for kind in 2..=MAX_ATTR_NEST as u16 {
        tree = Node::Nest(kind, vec![tree]);
    }

    let message = build(NLMSG_HDRLEN, std::slice::from_ref(&tree));
    let attr = Attributes::new(&message[NLMSG_HDRLEN..]).next().unwrap();
    verify(&attr, NLMSG_HDRLEN, &tree);
}
