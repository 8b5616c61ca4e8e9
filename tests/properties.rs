use parallax::{compile, Acl, CompiledPolicy, Model, Policy, Rule};
use proptest::prelude::*;

const INSTANCES: [&str; 3] = ["x", "y", "z"];
const CAPABILITIES: [&str; 3] = ["read", "write", "share"];

fn model() -> Model {
    let mut builder = Model::builder();
    builder
        .define_resource("doc")
        .expect("define doc")
        .capabilities(CAPABILITIES)
        .expect("doc capabilities")
        .alias("edit", ["read", "write"])
        .expect("edit alias");
    builder.build().expect("valid model")
}

fn arb_rule() -> impl Strategy<Value = Rule> {
    let instance = prop::sample::select(vec!["*", "x", "y"]);
    let names = prop::sample::subsequence(vec!["read", "write", "share", "edit"], 1..=4);
    (instance, names).prop_map(|(instance, names)| Rule::new("doc", instance, names))
}

fn arb_policy() -> impl Strategy<Value = CompiledPolicy> {
    prop::collection::vec(arb_rule(), 0..4).prop_map(|rules| {
        let policy = rules
            .into_iter()
            .fold(Policy::new("p"), |policy, rule| policy.with_rule(rule));
        compile(&policy, &model()).expect("generated rules are valid")
    })
}

/// Every (instance, capability) pair the ACL allows on `doc`.
fn allowed(acl: &Acl) -> Vec<(&'static str, &'static str)> {
    let mut out = Vec::new();
    for instance in INSTANCES {
        for capability in CAPABILITIES {
            if acl.is_authorized("doc", instance, capability) {
                out.push((instance, capability));
            }
        }
    }
    out
}

proptest! {
    #[test]
    fn merge_is_order_independent(a in arb_policy(), b in arb_policy(), c in arb_policy()) {
        let abc = Acl::merge([&a, &b, &c]);
        prop_assert_eq!(&abc, &Acl::merge([&c, &a, &b]));
        prop_assert_eq!(&abc, &Acl::merge([&b, &c, &a]));
    }

    #[test]
    fn merge_is_idempotent(a in arb_policy()) {
        prop_assert_eq!(Acl::merge([&a, &a]), Acl::merge([&a]));
    }

    #[test]
    fn adding_a_policy_never_revokes(a in arb_policy(), b in arb_policy()) {
        let alone = Acl::merge([&a]);
        let both = Acl::merge([&a, &b]);
        for (instance, capability) in allowed(&alone) {
            prop_assert!(both.is_authorized("doc", instance, capability));
        }
    }

    #[test]
    fn merged_acl_is_union_of_parts(a in arb_policy(), b in arb_policy()) {
        let both = Acl::merge([&a, &b]);
        let (left, right) = (Acl::merge([&a]), Acl::merge([&b]));
        for instance in INSTANCES {
            for capability in CAPABILITIES {
                prop_assert_eq!(
                    both.is_authorized("doc", instance, capability),
                    left.is_authorized("doc", instance, capability)
                        || right.is_authorized("doc", instance, capability)
                );
            }
        }
    }

    #[test]
    fn unmodelled_names_are_denied(a in arb_policy(), instance in "[a-z]{1,4}") {
        let acl = Acl::merge([&a]);
        prop_assert!(!acl.is_authorized("other", &instance, "read"));
        prop_assert!(!acl.is_authorized("doc", &instance, "edit"));
        prop_assert!(!acl.is_authorized("doc", &instance, "delete"));
    }

    #[test]
    fn wildcard_grants_reach_every_instance(names in prop::sample::subsequence(vec!["read", "write", "share"], 1..=3), instance in "[a-z]{1,8}") {
        let policy = Policy::new("p").with_rule(Rule::new("doc", "*", names.clone()));
        let acl = Acl::merge([&compile(&policy, &model()).unwrap()]);
        for name in names {
            prop_assert!(acl.is_authorized("doc", &instance, name));
        }
    }
}
