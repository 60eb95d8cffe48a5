use super::profile::{AgentMember, AgentProfile};
use crate::domain::{BusinessStage, BuyerStage, SellerStage};
use crate::tools::ToolKind;

const REGISTRATION_FLOW: &str = "## FLUJO DE LA ETAPA DE REGISTRO\n\
Esta etapa recopila la información del vendedor y de su propiedad.\n\
\n\
### Orden de Ejecución:\n\
1. **SellerRegistrationAgent**: confirma el nombre del vendedor\n\
2. **PropertyRegistrationAgent**: registra dirección, tipo, precio y descripción\n\
3. **ImageProcessingAgent**: solicita al menos tres fotos de la propiedad\n\
4. **QAAgent**: resuelve dudas del proceso en cualquier momento\n\
\n\
### Notas Importantes:\n\
- Usa get_remaining_info para saber qué falta antes de preguntar\n\
- Cuando el registro esté completo, avisa al vendedor que seguimos con la publicación";

const PUBLISHING_FLOW: &str = "## FLUJO DE LA ETAPA DE PUBLICACIÓN\n\
La propiedad ya está registrada. Ahora se prepara su publicación.\n\
\n\
### Orden de Ejecución:\n\
1. **AgendaAgent**: registra los horarios en que el vendedor NO puede recibir visitas\n\
2. **PropertyCardAgent**: arma la ficha de la propiedad\n\
3. **AppraisalAgent**: ofrece un precio de referencia\n\
4. **PublishingAgent**: publica la propiedad y envía el código QR\n\
5. **QAAgent**: resuelve dudas del proceso\n\
\n\
### Notas Importantes:\n\
- Cada agente completa su tarea antes de pasar al siguiente\n\
- La ficha, el avalúo y la publicación se ofrecen; no se imponen";

const VISITS_FLOW: &str = "## FLUJO DE LA ETAPA DE VISITAS\n\
La propiedad está publicada y los compradores solicitan visitas.\n\
\n\
### Orden de Ejecución:\n\
1. **VisitConfirmationAgent**: confirma, cancela o marca como realizadas las visitas\n\
2. **QAAgent**: resuelve dudas sobre la gestión de visitas\n\
\n\
### Notas Importantes:\n\
- Usa list_pending_visits para conocer las visitas y sus identificadores\n\
- Cuando el vendedor cuente que ya tuvo la visita, márcala como realizada";

const COMPLETED_FLOW: &str = "## FLUJO DE LA ETAPA DE ACUERDO COMPLETADO\n\
Esta etapa se activa cuando el vendedor reporta el resultado de una visita.\n\
\n\
### Flujo Conversacional:\n\
1. **Pregunta inicial**: '¿Cómo te fue con tu visita con [nombre del comprador]?'\n\
2. **Evaluación de respuesta**: escucha si la visita resultó exitosa\n\
3. **Oferta de contrato**: si hubo acuerdo, pregunta si quiere el contrato\n\
4. **Generación**: solo genera el contrato si el vendedor confirma que sí\n\
\n\
### Notas Importantes:\n\
- El proceso SIEMPRE inicia preguntando sobre la visita\n\
- No genera contratos automáticamente, requiere confirmación";

const SCHEDULING_FLOW: &str = "## FLUJO DE LA ETAPA DE PROGRAMACIÓN DE VISITAS\n\
Esta etapa sigue un flujo secuencial para completar la programación de visitas:\n\
\n\
### Orden de Ejecución:\n\
1. **BookingAgent**: registra al comprador, agenda la visita y notifica al vendedor\n\
\n\
### Notas Importantes:\n\
- Si falta información del comprador, el BookingAgent la resuelve antes de agendar\n\
- Nunca confirmes una visita que la herramienta haya rechazado";

fn qa_member(topic: &'static str) -> AgentMember {
    AgentMember {
        name: "QAAgent",
        description: "Agente especializado en responder dudas sobre el proceso.",
        instructions: topic,
        tools: Vec::new(),
    }
}

fn register() -> AgentProfile {
    AgentProfile {
        key: "register",
        stage: BusinessStage::Seller(SellerStage::Registration),
        flow: REGISTRATION_FLOW,
        members: vec![
            AgentMember {
                name: "SellerRegistrationAgent",
                description: "Agente especializado en registrar la información básica del vendedor.",
                instructions: "Saluda, preséntate y pregunta el nombre del vendedor si no lo conoces. Guárdalo con save_seller_info.",
                tools: vec![ToolKind::SaveSellerInfo],
            },
            AgentMember {
                name: "PropertyRegistrationAgent",
                description: "Agente especializado en registrar la información básica de la propiedad.",
                instructions: "Pide los datos que falten de la propiedad (dirección, tipo, precio, descripción, comodidades, lugares cercanos) y guárdalos con save_property_info apenas los recibas. \
Si get_remaining_info indica que el registro está completo y la etapa no avanzó, usa update_business_stage con 'publishing'.",
                tools: vec![
                    ToolKind::GetRemainingInfo,
                    ToolKind::SavePropertyInfo,
                    ToolKind::UpdateBusinessStage,
                ],
            },
            AgentMember {
                name: "ImageProcessingAgent",
                description: "Agente especializado en solicitar y procesar las imágenes de la propiedad.",
                instructions: "Pide fotos de la propiedad. Los mensajes con [imagen] traen la URL de la foto; guárdala en pictures con save_property_info.",
                tools: vec![ToolKind::SavePropertyInfo],
            },
            qa_member("Responde dudas sobre el proceso de registro de vendedores y propiedades."),
        ],
        advances_to: None,
    }
}

fn publisher() -> AgentProfile {
    AgentProfile {
        key: "publisher",
        stage: BusinessStage::Seller(SellerStage::Publishing),
        flow: PUBLISHING_FLOW,
        members: vec![
            AgentMember {
                name: "AgendaAgent",
                description: "Agente especializado en gestionar la agenda del vendedor para programar visitas.",
                instructions: "Pregunta en qué días y horas el vendedor NO puede recibir visitas y guárdalos con save_availability.",
                tools: vec![ToolKind::SaveAvailability],
            },
            AgentMember {
                name: "PropertyCardAgent",
                description: "Agente especializado en crear fichas detalladas de propiedades.",
                instructions: "Ofrece crear la ficha de la propiedad y compártela con create_property_card.",
                tools: vec![ToolKind::CreatePropertyCard],
            },
            AgentMember {
                name: "AppraisalAgent",
                description: "Agente especializado en estimar el valor de propiedades.",
                instructions: "Ofrece un precio de referencia con get_appraisal_info y compáralo con el precio del vendedor.",
                tools: vec![ToolKind::GetAppraisalInfo],
            },
            AgentMember {
                name: "PublishingAgent",
                description: "Agente especializado en publicar propiedades y generar su código QR.",
                instructions: "Cuando el vendedor esté de acuerdo, publica con publish_property y genera el QR con generate_qr. \
Si la propiedad ya estaba publicada, usa update_business_stage con 'visits'.",
                tools: vec![
                    ToolKind::PublishProperty,
                    ToolKind::GenerateQr,
                    ToolKind::UpdateBusinessStage,
                ],
            },
            qa_member("Responde dudas sobre agenda, fichas, avalúos y publicación."),
        ],
        advances_to: None,
    }
}

fn visits() -> AgentProfile {
    AgentProfile {
        key: "visits",
        stage: BusinessStage::Seller(SellerStage::Visits),
        flow: VISITS_FLOW,
        members: vec![
            AgentMember {
                name: "VisitConfirmationAgent",
                description: "Agente especializado en confirmar, cancelar o cerrar visitas de compradores.",
                instructions: "Consulta las visitas pendientes y confírmalas, cancélalas o márcalas como realizadas según lo que diga el vendedor. \
Si el vendedor cuenta que cerró la venta sin una visita registrada, usa update_business_stage con 'completed'.",
                tools: vec![
                    ToolKind::ListPendingVisits,
                    ToolKind::ConfirmVisit,
                    ToolKind::CancelVisit,
                    ToolKind::CompleteVisit,
                    ToolKind::UpdateBusinessStage,
                ],
            },
            qa_member("Responde dudas sobre la confirmación y gestión de visitas."),
        ],
        advances_to: None,
    }
}

fn completed_deal() -> AgentProfile {
    AgentProfile {
        key: "completed_deal",
        stage: BusinessStage::Seller(SellerStage::Completed),
        flow: COMPLETED_FLOW,
        members: vec![AgentMember {
            name: "ContractManagementAgent",
            description: "Agente especializado en la gestión de acuerdos completados de compra y venta.",
            instructions: "1. Usa get_last_visit_buyer y pregunta '¡Hola! ¿Cómo te fue con tu visita con [nombre del comprador]?'\n\
2. Espera la respuesta del vendedor.\n\
3. Si se concretó la venta, pregunta '¿Te gustaría que genere el contrato de compra y venta?'\n\
4. Solo si confirma, usa generate_sales_contract.\n\
NUNCA generes el contrato sin confirmación. Si no hay información del comprador, usa 'comprador'.",
            tools: vec![ToolKind::GetLastVisitBuyer, ToolKind::GenerateSalesContract],
        }],
        advances_to: None,
    }
}

fn scheduler(stage: BuyerStage) -> AgentProfile {
    AgentProfile {
        key: "scheduler",
        stage: BusinessStage::Buyer(stage),
        flow: SCHEDULING_FLOW,
        members: vec![AgentMember {
            name: "BookingAgent",
            description: "Agente especializado en programar visitas de compradores y notificar a los vendedores.",
            instructions: "Pregunta el nombre del comprador si falta y guárdalo con save_buyer_info. Consulta la disponibilidad del vendedor, \
propón horarios libres, agenda con save_visit_info usando fechas YYYY-MM-DD y horas HH:MM, y luego avisa al vendedor con notify_seller.",
            tools: vec![
                ToolKind::GetRemainingBuyerInfo,
                ToolKind::SaveBuyerInfo,
                ToolKind::GetSellerAvailability,
                ToolKind::SaveVisitInfo,
                ToolKind::NotifySeller,
            ],
        }],
        advances_to: match stage {
            BuyerStage::Contact => Some(BusinessStage::Buyer(BuyerStage::Qualification)),
            _ => None,
        },
    }
}

/// Fixed role × stage table.
pub fn dispatch(stage: BusinessStage) -> AgentProfile {
    match stage {
        BusinessStage::Seller(SellerStage::Registration) => register(),
        BusinessStage::Seller(SellerStage::Publishing) => publisher(),
        BusinessStage::Seller(SellerStage::Visits) => visits(),
        BusinessStage::Seller(SellerStage::Completed) => completed_deal(),
        BusinessStage::Buyer(stage) => scheduler(stage),
    }
}

/// Every stage with the profile it dispatches to, in funnel order.
pub fn dispatch_table() -> Vec<AgentProfile> {
    BusinessStage::all().map(dispatch).collect()
}
